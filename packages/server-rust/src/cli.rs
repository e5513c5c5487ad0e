//! Command-line flags, with `BREAKFAST_*` environment fallbacks.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::network::{NetworkConfig, TlsConfig};
use crate::observability::{AccessLogTarget, LogFormat};
use crate::service::api::DEFAULT_MAX_IMAGE_BYTES;
use crate::service::ServiceConfig;

/// Where access-log entries go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum AccessLogMode {
    /// One `tracing` event per request at target `access`.
    #[default]
    Tracing,
    /// Discard entries.
    Off,
    /// Newline-delimited JSON to `--access-log-addr`.
    Tcp,
}

#[derive(Debug, Parser)]
#[command(name = "breakfast-server")]
#[command(about = "Breakfast Solutions API server", long_about = None)]
pub struct Cli {
    /// API listen address.
    #[arg(long = "api", env = "BREAKFAST_API", default_value = "0.0.0.0:8443")]
    pub api_addr: SocketAddr,

    /// Metrics and health listen address.
    #[arg(long = "metrics", env = "BREAKFAST_METRICS", default_value = "0.0.0.0:8081")]
    pub metrics_addr: SocketAddr,

    /// TLS certificate chain (PEM); serves HTTPS together with --key.
    #[arg(long, env = "BREAKFAST_CERT", requires = "key")]
    pub cert: Option<PathBuf>,

    /// TLS private key (PEM).
    #[arg(long, env = "BREAKFAST_KEY", requires = "cert")]
    pub key: Option<PathBuf>,

    /// Breakfast dataset, a JSON array of records.
    #[arg(long = "db", env = "BREAKFAST_DB", default_value = "breakfasts.json")]
    pub dataset: PathBuf,

    /// Directory served under /images/.
    #[arg(long = "images", env = "BREAKFAST_IMAGES", default_value = "images/")]
    pub image_dir: PathBuf,

    /// Image files larger than this are refused.
    #[arg(long, env = "BREAKFAST_MAX_IMAGE_BYTES", default_value_t = DEFAULT_MAX_IMAGE_BYTES)]
    pub max_image_bytes: usize,

    /// Log at debug level and print span timings.
    #[arg(long, env = "BREAKFAST_DEBUG")]
    pub debug: bool,

    #[arg(long, env = "BREAKFAST_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[arg(long, env = "BREAKFAST_ACCESS_LOG", value_enum, default_value_t = AccessLogMode::Tracing)]
    pub access_log: AccessLogMode,

    /// Collector `host:port` for --access-log tcp.
    #[arg(long, env = "BREAKFAST_ACCESS_LOG_ADDR", required_if_eq("access_log", "tcp"))]
    pub access_log_addr: Option<String>,

    /// Skip the simulated stage delays.
    #[arg(long, env = "BREAKFAST_NO_LATENCY")]
    pub no_latency: bool,

    /// Grace period for in-flight requests after a termination signal.
    #[arg(long, env = "BREAKFAST_SHUTDOWN_GRACE_MS", default_value_t = 1000)]
    pub shutdown_grace_ms: u64,
}

impl Cli {
    #[must_use]
    pub fn network_config(&self) -> NetworkConfig {
        let tls = match (&self.cert, &self.key) {
            (Some(cert), Some(key)) => Some(TlsConfig {
                cert_path: cert.clone(),
                key_path: key.clone(),
            }),
            _ => None,
        };
        NetworkConfig {
            api_addr: self.api_addr,
            metrics_addr: self.metrics_addr,
            tls,
            shutdown_grace: Duration::from_millis(self.shutdown_grace_ms),
        }
    }

    /// # Errors
    ///
    /// Returns an error if `--access-log tcp` is given without a collector
    /// address.
    pub fn service_config(&self) -> anyhow::Result<ServiceConfig> {
        let access_log = match self.access_log {
            AccessLogMode::Tracing => AccessLogTarget::Tracing,
            AccessLogMode::Off => AccessLogTarget::Off,
            AccessLogMode::Tcp => {
                let addr = self
                    .access_log_addr
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("--access-log tcp needs --access-log-addr"))?;
                AccessLogTarget::Tcp(addr)
            }
        };
        Ok(ServiceConfig {
            dataset_path: self.dataset.clone(),
            image_dir: self.image_dir.clone(),
            max_image_bytes: self.max_image_bytes,
            simulate_latency: !self.no_latency,
            access_log,
        })
    }
}
