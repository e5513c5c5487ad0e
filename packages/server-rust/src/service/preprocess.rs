use std::time::Duration;

use async_trait::async_trait;
use breakfast_core::{Preprocessor, RequestState};

/// Region-aware preprocessing that simulates a geo lookup: Australian
/// requests take noticeably longer than the rest.
#[derive(Debug, Clone, Copy)]
pub struct GeoPreprocessor {
    simulate_latency: bool,
}

impl GeoPreprocessor {
    #[must_use]
    pub fn new(simulate_latency: bool) -> Self {
        Self { simulate_latency }
    }

    /// Simulated delay for `region`, compared case-insensitively.
    #[must_use]
    pub fn delay_for(region: &str) -> Duration {
        if region.eq_ignore_ascii_case("au") {
            Duration::from_millis(100)
        } else {
            Duration::from_millis(1)
        }
    }
}

#[async_trait]
impl Preprocessor for GeoPreprocessor {
    async fn preprocess(&self, _state: &mut RequestState, region: &str) {
        if self.simulate_latency {
            tokio::time::sleep(Self::delay_for(region)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use breakfast_core::Stopwatch;

    use super::*;
    use crate::testing::{state, RecordingSink};

    #[test]
    fn au_is_slow_regardless_of_case() {
        assert_eq!(GeoPreprocessor::delay_for("au"), Duration::from_millis(100));
        assert_eq!(GeoPreprocessor::delay_for("AU"), Duration::from_millis(100));
        assert_eq!(GeoPreprocessor::delay_for("??"), Duration::from_millis(1));
        assert_eq!(GeoPreprocessor::delay_for("us"), Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn preprocess_sleeps_for_region_delay() {
        let mut state = state(&RecordingSink::new());
        let sw = Stopwatch::start();
        GeoPreprocessor::new(true).preprocess(&mut state, "Au").await;
        assert!(sw.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn latency_toggle_skips_sleep() {
        let mut state = state(&RecordingSink::new());
        let sw = Stopwatch::start();
        GeoPreprocessor::new(false).preprocess(&mut state, "au").await;
        assert_eq!(sw.elapsed(), Duration::ZERO);
    }
}
