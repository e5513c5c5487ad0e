use std::time::Duration;

use async_trait::async_trait;
use breakfast_core::{Postprocessor, RequestState};
use rand::Rng;

/// Postprocessing that simulates backpressure: failed requests are held
/// fifty times longer than successful ones.
#[derive(Debug, Clone, Copy)]
pub struct BackpressurePostprocessor {
    simulate_latency: bool,
}

impl BackpressurePostprocessor {
    #[must_use]
    pub fn new(simulate_latency: bool) -> Self {
        Self { simulate_latency }
    }

    /// Base delay in milliseconds for the given outcome.
    #[must_use]
    pub fn base_delay_ms(success: bool) -> u64 {
        if success {
            1
        } else {
            50
        }
    }

    /// `d + rand[0, d)` milliseconds, where `d` is the base delay.
    fn delay(success: bool) -> Duration {
        let base = Self::base_delay_ms(success);
        let jitter = rand::rng().random_range(0..base);
        Duration::from_millis(base + jitter)
    }
}

#[async_trait]
impl Postprocessor for BackpressurePostprocessor {
    async fn postprocess(&self, _state: &mut RequestState, _username: &str, success: bool) {
        if self.simulate_latency {
            let delay = Self::delay(success);
            tokio::time::sleep(delay).await;
        }
    }
}
