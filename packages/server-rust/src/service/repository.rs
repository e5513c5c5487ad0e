//! JSON-file-backed breakfast repository with simulated shard latency.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use breakfast_core::{Breakfast, Repository, RepositoryError, RequestState};
use rand::Rng;

/// Extra delay applied during the first minute of every hour.
const TOP_OF_HOUR_DELAY: Duration = Duration::from_millis(300);

/// Dataset load failures. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse dataset {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// In-memory dataset loaded once from a JSON array of records.
#[derive(Debug, Clone)]
pub struct JsonRepository {
    breakfasts: Vec<Breakfast>,
    simulate_latency: bool,
}

impl JsonRepository {
    /// Reads and parses the dataset at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Io`] if the file cannot be read and
    /// [`LoadError::Parse`] if it is not a JSON array of records.
    pub fn load(path: &Path, simulate_latency: bool) -> Result<Self, LoadError> {
        let raw = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let breakfasts = serde_json::from_slice(&raw).map_err(|source| LoadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_records(breakfasts, simulate_latency))
    }

    #[must_use]
    pub fn from_records(breakfasts: Vec<Breakfast>, simulate_latency: bool) -> Self {
        Self {
            breakfasts,
            simulate_latency,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.breakfasts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.breakfasts.is_empty()
    }

    async fn simulate(&self, username: &str) {
        if self.simulate_latency {
            let delay = simulated_delay(username);
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Repository for JsonRepository {
    async fn get_by_id(
        &self,
        _state: &mut RequestState,
        username: &str,
        id: u64,
    ) -> Result<Breakfast, RepositoryError> {
        self.simulate(username).await;
        self.breakfasts
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or(RepositoryError::NotFound { id })
    }

    async fn get_random(
        &self,
        _state: &mut RequestState,
        username: &str,
    ) -> Result<Breakfast, RepositoryError> {
        self.simulate(username).await;
        if self.breakfasts.is_empty() {
            return Err(RepositoryError::Unavailable);
        }
        let index = rand::rng().random_range(0..self.breakfasts.len());
        Ok(self.breakfasts[index].clone())
    }
}

/// Shard delay bounds `[min, max)` in milliseconds, picked by the first
/// letter of the lowercased username.
#[must_use]
pub fn shard_delay_range(username: &str) -> (u64, u64) {
    match username.chars().next().map(|c| c.to_ascii_lowercase()) {
        Some('a'..='e') => (15, 35),
        Some('f'..='j') => (20, 40),
        Some('k'..='o') => (150, 300),
        Some('p'..='t') => (60, 80),
        Some('u'..='y') => (10, 30),
        _ => (10, 20),
    }
}

fn simulated_delay(username: &str) -> Duration {
    let (min, max) = shard_delay_range(username);
    let shard = Duration::from_millis(rand::rng().random_range(min..max));
    if is_top_of_hour(SystemTime::now()) {
        shard + TOP_OF_HOUR_DELAY
    } else {
        shard
    }
}

fn is_top_of_hour(now: SystemTime) -> bool {
    now.duration_since(UNIX_EPOCH)
        .is_ok_and(|since| (since.as_secs() / 60) % 60 == 0)
}
