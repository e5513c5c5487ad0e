//! Breakfast Solutions core: dataset records, per-request state, and the
//! pipeline stage traits decorated by the server crate.

pub mod context;
pub mod error;
pub mod timing;
pub mod traits;
pub mod types;

pub use context::{LogFields, RequestState};
pub use error::RepositoryError;
pub use timing::{took, Stopwatch};
pub use traits::{DurationSink, Observation, Postprocessor, Preprocessor, Repository};
pub use types::{Breakfast, LogValue};
