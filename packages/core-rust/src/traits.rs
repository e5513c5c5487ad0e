use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::context::RequestState;
use crate::error::RepositoryError;
use crate::types::Breakfast;

/// One timed observation of a pipeline stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Component label, e.g. `"DB"` or `"API"`.
    pub component: &'static str,
    /// Operation label. Must come from a bounded set to keep label
    /// cardinality under control.
    pub operation: Cow<'static, str>,
    /// Whether the observed call succeeded.
    pub success: bool,
    /// Wall time spent inside the observed call.
    pub elapsed: Duration,
}

impl Observation {
    /// The `success` label value: `"true"` or `"false"`.
    #[must_use]
    pub fn success_label(&self) -> &'static str {
        if self.success {
            "true"
        } else {
            "false"
        }
    }
}

/// Shared sink recording stage durations as a histogram keyed by
/// `(component, operation, success)`.
///
/// One sink is shared by every in-flight request, so `observe` must be safe
/// to call concurrently without external locking.
pub trait DurationSink: Send + Sync {
    /// Record a single observation.
    fn observe(&self, observation: Observation);
}

/// Region-dependent work performed before the repository is consulted.
/// Never fails; its observable effects are latency and request-state updates.
#[async_trait]
pub trait Preprocessor: Send + Sync {
    /// Run the preprocessing step for the given region hint.
    async fn preprocess(&self, state: &mut RequestState, region: &str);
}

/// Read-only access to the breakfast dataset.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Look up a breakfast by identifier.
    async fn get_by_id(
        &self,
        state: &mut RequestState,
        username: &str,
        id: u64,
    ) -> Result<Breakfast, RepositoryError>;

    /// Pick a breakfast uniformly at random.
    async fn get_random(
        &self,
        state: &mut RequestState,
        username: &str,
    ) -> Result<Breakfast, RepositoryError>;
}

/// Work performed after the repository call, given its outcome.
/// Never fails.
#[async_trait]
pub trait Postprocessor: Send + Sync {
    /// Run the postprocessing step for the given user and outcome.
    async fn postprocess(&self, state: &mut RequestState, username: &str, success: bool);
}

#[async_trait]
impl<T: Preprocessor + ?Sized> Preprocessor for Arc<T> {
    async fn preprocess(&self, state: &mut RequestState, region: &str) {
        (**self).preprocess(state, region).await;
    }
}

#[async_trait]
impl<T: Repository + ?Sized> Repository for Arc<T> {
    async fn get_by_id(
        &self,
        state: &mut RequestState,
        username: &str,
        id: u64,
    ) -> Result<Breakfast, RepositoryError> {
        (**self).get_by_id(state, username, id).await
    }

    async fn get_random(
        &self,
        state: &mut RequestState,
        username: &str,
    ) -> Result<Breakfast, RepositoryError> {
        (**self).get_random(state, username).await
    }
}

#[async_trait]
impl<T: Postprocessor + ?Sized> Postprocessor for Arc<T> {
    async fn postprocess(&self, state: &mut RequestState, username: &str, success: bool) {
        (**self).postprocess(state, username, success).await;
    }
}

impl<T: DurationSink + ?Sized> DurationSink for Arc<T> {
    fn observe(&self, observation: Observation) {
        (**self).observe(observation);
    }
}
