use std::time::Duration;

use tokio::time::Instant;

/// Measures wall time for one decorated call.
///
/// Backed by [`tokio::time::Instant`] so paused-clock tests observe the
/// virtual elapsed time.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    #[must_use]
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Human-readable duration used for `*_took` log fields, e.g. `"15.2ms"`.
#[must_use]
pub fn took(elapsed: Duration) -> String {
    format!("{elapsed:?}")
}
