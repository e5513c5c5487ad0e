//! Breakfast Solutions server: breakfast lookup over HTTP, with logging,
//! metrics, and tracing decorators around every pipeline stage.

pub mod cli;
pub mod network;
pub mod observability;
pub mod service;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use traits::{ApiHandler, ResponseWriter};
