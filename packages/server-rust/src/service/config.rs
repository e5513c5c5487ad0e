use std::path::PathBuf;

use crate::observability::AccessLogTarget;
use crate::service::api::DEFAULT_MAX_IMAGE_BYTES;

/// Service-level configuration: where the dataset and images live, whether
/// the stages simulate latency, and where access-log entries go.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// JSON array of breakfast records, loaded once at startup.
    pub dataset_path: PathBuf,
    /// Directory served under `/images/`.
    pub image_dir: PathBuf,
    /// Larger image files are refused rather than buffered.
    pub max_image_bytes: usize,
    /// When false, the preprocessor, repository, and postprocessor skip
    /// their artificial delays.
    pub simulate_latency: bool,
    pub access_log: AccessLogTarget,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("breakfasts.json"),
            image_dir: PathBuf::from("images"),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            simulate_latency: true,
            access_log: AccessLogTarget::default(),
        }
    }
}
