//! Network configuration for the API and metrics listeners.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Default port of the API listener.
pub const DEFAULT_API_PORT: u16 = 8443;
/// Default port of the metrics listener.
pub const DEFAULT_METRICS_PORT: u16 = 8081;

/// Top-level network configuration for the server.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Bind address of the breakfast API. Port 0 means OS-assigned.
    pub api_addr: SocketAddr,
    /// Bind address of the metrics and health listener.
    pub metrics_addr: SocketAddr,
    /// TLS for the API listener; plain HTTP when absent.
    pub tls: Option<TlsConfig>,
    /// How long in-flight requests get to finish after the shutdown signal.
    pub shutdown_grace: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            api_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_API_PORT)),
            metrics_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_METRICS_PORT)),
            tls: None,
            shutdown_grace: Duration::from_millis(1000),
        }
    }
}

/// TLS certificate configuration.
///
/// No `Default` impl because certificate paths have no sensible defaults.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// PEM certificate chain.
    pub cert_path: PathBuf,
    /// PEM private key.
    pub key_path: PathBuf,
}
