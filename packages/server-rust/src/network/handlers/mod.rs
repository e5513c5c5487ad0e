//! HTTP handler definitions for the API and metrics listeners.
//!
//! This module defines the shared state carried through axum extractors on
//! each listener and re-exports all handler functions for convenient access
//! when building the routers.

pub mod api;
pub mod health;
pub mod metrics;

pub use api::api_handler;
pub use health::{health_handler, liveness_handler, readiness_handler};
pub use metrics::metrics_handler;

use std::sync::Arc;
use std::time::Instant;

use breakfast_core::DurationSink;

use super::ShutdownController;
use crate::observability::PrometheusDurations;
use crate::traits::ApiHandler;

/// State of the API listener.
///
/// Holds `Arc` references to shared resources so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// The fully instrumented handler stack.
    pub handler: Arc<dyn ApiHandler>,
    /// Metrics sink attached to every request's `RequestState`.
    pub durations: Arc<dyn DurationSink>,
    /// Graceful shutdown controller with health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
}

/// State of the metrics and health listener.
#[derive(Clone)]
pub struct OpsState {
    pub metrics: Arc<PrometheusDurations>,
    pub shutdown: Arc<ShutdownController>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}
