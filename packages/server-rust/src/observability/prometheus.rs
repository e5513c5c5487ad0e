//! Prometheus-backed duration histogram.
//!
//! The recorder is built explicitly and never installed as the global
//! `metrics` recorder; every observation goes through
//! [`PrometheusDurations::observe`].

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use breakfast_core::{DurationSink, Observation};
use metrics::{Key, Label, Level, Metadata, Recorder, Unit};
use metrics_exporter_prometheus::{
    BuildError, Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder,
};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Histogram name for every stage observation.
pub const REQUEST_DURATION: &str = "breakfast_solutions_service_request_duration_seconds";

const HELP: &str = "Duration of each phase of a request in seconds.";

/// Default Prometheus client buckets, in seconds.
pub const DEFAULT_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("failed to configure histogram buckets: {0}")]
    Buckets(#[from] BuildError),
}

/// Histogram of stage durations labeled by `component`, `operation`, and
/// `success`, rendered in the Prometheus text exposition format.
pub struct PrometheusDurations {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
}

impl PrometheusDurations {
    /// Builds the recorder and registers the histogram description.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Buckets`] if the bucket configuration is
    /// rejected.
    pub fn new() -> Result<Self, MetricsError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full(REQUEST_DURATION.to_string()),
                &DEFAULT_BUCKETS,
            )?
            .build_recorder();
        recorder.describe_histogram(REQUEST_DURATION.into(), Some(Unit::Seconds), HELP.into());
        let handle = recorder.handle();
        Ok(Self { recorder, handle })
    }

    /// Current exposition text.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Drains histogram buffers into their buckets.
    pub fn run_upkeep(&self) {
        self.handle.run_upkeep();
    }

    /// Runs [`run_upkeep`](Self::run_upkeep) every `period` until the
    /// returned task is aborted.
    #[must_use]
    pub fn spawn_upkeep(durations: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticks.tick().await;
            loop {
                ticks.tick().await;
                durations.run_upkeep();
            }
        })
    }
}

impl DurationSink for PrometheusDurations {
    fn observe(&self, observation: Observation) {
        let success = observation.success_label();
        let Observation {
            component,
            operation,
            elapsed,
            ..
        } = observation;
        let operation = match operation {
            Cow::Borrowed(op) => Label::new("operation", op),
            Cow::Owned(op) => Label::new("operation", op),
        };
        let key = Key::from_parts(
            REQUEST_DURATION,
            vec![
                Label::new("component", component),
                operation,
                Label::new("success", success),
            ],
        );
        let metadata = Metadata::new(module_path!(), Level::INFO, Some(module_path!()));
        self.recorder
            .register_histogram(&key, &metadata)
            .record(elapsed.as_secs_f64());
    }
}

impl std::fmt::Debug for PrometheusDurations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusDurations").finish_non_exhaustive()
    }
}
