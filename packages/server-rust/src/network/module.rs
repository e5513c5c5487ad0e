//! Network module with deferred startup lifecycle.
//!
//! Implements the deferred startup pattern: `new()` creates resources,
//! `start()` binds both TCP listeners, and `serve()` starts accepting
//! connections. This separation lets the binary log the bound addresses
//! (and tests pick OS-assigned ports) before traffic flows.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use axum::routing::get;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use breakfast_core::DurationSink;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::config::{NetworkConfig, TlsConfig};
use super::handlers::{
    api_handler, health_handler, liveness_handler, metrics_handler, readiness_handler, AppState,
    OpsState,
};
use super::middleware::build_http_layers;
use super::shutdown::ShutdownController;
use crate::observability::PrometheusDurations;
use crate::traits::ApiHandler;

/// Manages the API and metrics servers.
///
/// Follows the deferred startup pattern:
/// 1. `new()` -- allocates shared state (shutdown controller)
/// 2. `start()` -- binds both TCP listeners to the configured addresses
/// 3. `serve()` -- accepts connections until shutdown is signalled
pub struct NetworkModule {
    config: NetworkConfig,
    handler: Arc<dyn ApiHandler>,
    metrics: Arc<PrometheusDurations>,
    api_listener: Option<TcpListener>,
    metrics_listener: Option<TcpListener>,
    shutdown: Arc<ShutdownController>,
    start_time: Instant,
}

impl NetworkModule {
    /// Creates a new network module without binding any port.
    #[must_use]
    pub fn new(
        config: NetworkConfig,
        handler: Arc<dyn ApiHandler>,
        metrics: Arc<PrometheusDurations>,
    ) -> Self {
        Self {
            config,
            handler,
            metrics,
            api_listener: None,
            metrics_listener: None,
            shutdown: Arc::new(ShutdownController::new()),
            start_time: Instant::now(),
        }
    }

    /// Returns a shared reference to the shutdown controller.
    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Assembles the API router: every path goes to the instrumented
    /// handler stack, behind the request-id and HSTS layers.
    pub fn build_api_router(&self) -> Router {
        let state = AppState {
            handler: Arc::clone(&self.handler),
            durations: Arc::clone(&self.metrics) as Arc<dyn DurationSink>,
            shutdown: Arc::clone(&self.shutdown),
        };

        Router::new()
            .fallback(api_handler)
            .layer(build_http_layers())
            .with_state(state)
    }

    /// Assembles the operations router.
    ///
    /// Routes:
    /// - `GET /metrics` -- Prometheus exposition
    /// - `GET /health` -- detailed health JSON
    /// - `GET /health/live` -- liveness probe
    /// - `GET /health/ready` -- readiness probe
    pub fn build_ops_router(&self) -> Router {
        let state = OpsState {
            metrics: Arc::clone(&self.metrics),
            shutdown: Arc::clone(&self.shutdown),
            start_time: self.start_time,
        };

        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .with_state(state)
    }

    /// Binds the API and metrics listeners.
    ///
    /// Returns the actual bound addresses, which differ from the configured
    /// ones when port 0 is used (OS-assigned ephemeral port).
    ///
    /// # Errors
    ///
    /// Returns an error if either address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<(SocketAddr, SocketAddr)> {
        let api = TcpListener::bind(self.config.api_addr)
            .await
            .with_context(|| format!("failed to bind API listener on {}", self.config.api_addr))?;
        let metrics = TcpListener::bind(self.config.metrics_addr)
            .await
            .with_context(|| {
                format!("failed to bind metrics listener on {}", self.config.metrics_addr)
            })?;

        let api_addr = api.local_addr()?;
        let metrics_addr = metrics.local_addr()?;
        info!(%api_addr, %metrics_addr, "listeners bound");

        self.api_listener = Some(api);
        self.metrics_listener = Some(metrics);
        Ok((api_addr, metrics_addr))
    }

    /// Serves both listeners until the shutdown future resolves.
    ///
    /// After the shutdown signal:
    /// 1. Health state transitions to Draining and both servers stop accepting
    /// 2. Waits up to the configured grace period for in-flight requests
    /// 3. Health state transitions to Stopped
    /// 4. Servers still running after another grace period are aborted
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called, the TLS material cannot
    /// be loaded, or a server fails with an I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let (Some(api_listener), Some(metrics_listener)) =
            (self.api_listener.take(), self.metrics_listener.take())
        else {
            anyhow::bail!("start() must be called before serve()");
        };

        let tls = match &self.config.tls {
            Some(tls) => Some(load_tls(tls).await?),
            None => None,
        };

        let api_router = self.build_api_router();
        let ops_router = self.build_ops_router();
        let shutdown_ctrl = self.shutdown;
        let grace = self.config.shutdown_grace;

        // Transition to Ready so readiness probes pass.
        shutdown_ctrl.set_ready();

        let mut servers = JoinSet::new();
        let rx = shutdown_ctrl.shutdown_receiver();
        match tls {
            Some(rustls) => {
                servers.spawn(serve_tls(api_listener, api_router, rustls, rx.clone(), grace));
            }
            None => {
                servers.spawn(serve_plain(api_listener, api_router, rx.clone(), "api"));
            }
        }
        servers.spawn(serve_plain(metrics_listener, ops_router, rx, "metrics"));

        let mut failure = None;
        tokio::select! {
            () = shutdown => info!("shutdown signal received"),
            Some(joined) = servers.join_next() => {
                failure = server_failure(joined);
                error!("server exited before shutdown was requested");
            }
        }

        shutdown_ctrl.trigger_shutdown();
        if shutdown_ctrl.wait_for_drain(grace).await {
            info!("all in-flight requests drained");
        } else {
            warn!(
                in_flight = shutdown_ctrl.in_flight_count(),
                "drain timeout expired with in-flight requests remaining"
            );
        }

        let joined = tokio::time::timeout(grace, async {
            while let Some(joined) = servers.join_next().await {
                if let Some(e) = server_failure(joined) {
                    failure.get_or_insert(e);
                }
            }
        })
        .await;
        if joined.is_err() {
            warn!("servers still running after grace period, aborting");
            servers.abort_all();
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn server_failure(
    joined: Result<anyhow::Result<()>, tokio::task::JoinError>,
) -> Option<anyhow::Error> {
    match joined {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e),
        Err(e) => Some(anyhow::Error::new(e).context("server task failed")),
    }
}

async fn load_tls(tls: &TlsConfig) -> anyhow::Result<RustlsConfig> {
    RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
        .await
        .with_context(|| {
            format!(
                "failed to load TLS material from {} and {}",
                tls.cert_path.display(),
                tls.key_path.display()
            )
        })
}

async fn wait_for_signal(mut rx: watch::Receiver<bool>) {
    // An error means the controller is gone, which also ends serving.
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Serves plain HTTP using axum's built-in server.
async fn serve_plain(
    listener: TcpListener,
    router: Router,
    rx: watch::Receiver<bool>,
    name: &'static str,
) -> anyhow::Result<()> {
    info!(server = name, addr = %listener.local_addr()?, "serving plain HTTP");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(wait_for_signal(rx))
    .await
    .with_context(|| format!("{name} server failed"))
}

/// Serves TLS using `axum-server` with rustls.
///
/// Reuses the pre-bound TCP listener by converting it to a `std::net::TcpListener`.
async fn serve_tls(
    listener: TcpListener,
    router: Router,
    rustls: RustlsConfig,
    rx: watch::Receiver<bool>,
    grace: Duration,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    let std_listener = listener.into_std()?;
    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();

    tokio::spawn(async move {
        wait_for_signal(rx).await;
        shutdown_handle.graceful_shutdown(Some(grace));
    });

    info!(server = "api", %addr, "serving TLS");

    axum_server::from_tcp_rustls(std_listener, rustls)
        .handle(handle)
        .serve(router.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("api server failed")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use axum::body::{to_bytes, Body};
    use axum::http::header::{LOCATION, STRICT_TRANSPORT_SECURITY};
    use axum::http::{Request, StatusCode};
    use breakfast_core::Breakfast;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tower::ServiceExt;

    use super::*;
    use crate::network::HealthState;
    use crate::observability::{AccessLog, REQUEST_DURATION};
    use crate::service::{build_api, JsonRepository, ServiceConfig};
    use crate::testing::{breakfasts, MemoryAccessLog};

    fn local() -> NetworkConfig {
        let loopback = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
        NetworkConfig {
            api_addr: loopback,
            metrics_addr: loopback,
            tls: None,
            shutdown_grace: Duration::from_millis(500),
        }
    }

    fn module(records: Vec<Breakfast>) -> (NetworkModule, Arc<MemoryAccessLog>) {
        let log = MemoryAccessLog::new();
        let config = ServiceConfig {
            simulate_latency: false,
            ..ServiceConfig::default()
        };
        let handler = build_api(
            &config,
            JsonRepository::from_records(records, false),
            Arc::clone(&log) as Arc<dyn AccessLog>,
        );
        let metrics = Arc::new(PrometheusDurations::new().unwrap());
        (NetworkModule::new(local(), handler, metrics), log)
    }

    async fn get(router: &Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, String) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, String::from_utf8(body.to_vec()).unwrap())
    }

    #[test]
    fn new_creates_module_without_binding() {
        let (module, _) = module(breakfasts());
        assert!(module.api_listener.is_none());
        assert!(module.metrics_listener.is_none());
    }

    #[test]
    fn shutdown_controller_returns_shared_arc() {
        let (module, _) = module(breakfasts());
        let s1 = module.shutdown_controller();
        let s2 = module.shutdown_controller();
        assert!(Arc::ptr_eq(&s1, &s2));
    }

    #[tokio::test]
    async fn known_breakfast_renders() {
        let (module, log) = module(breakfasts());
        let router = module.build_api_router();

        let (status, headers, body) = get(&router, "/breakfasts/42").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Pancakes"));
        assert_eq!(
            headers[STRICT_TRANSPORT_SECURITY],
            "max-age=63072000; includeSubDomains"
        );
        let request_id = headers["x-request-id"].to_str().unwrap().to_string();
        assert!(!request_id.is_empty());

        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].get("http_req_id").and_then(|v| v.as_str()),
            Some(request_id.as_str())
        );
    }

    #[tokio::test]
    async fn unknown_breakfast_is_not_found() {
        let (module, _) = module(breakfasts());
        let router = module.build_api_router();
        let (status, headers, body) = get(&router, "/breakfasts/999999").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "no breakfast with ID 999999\n");
        assert!(headers.contains_key(STRICT_TRANSPORT_SECURITY));
    }

    #[tokio::test]
    async fn empty_dataset_root_counts_two_failures() {
        let (module, _) = module(Vec::new());
        let api = module.build_api_router();
        let ops = module.build_ops_router();

        for _ in 0..2 {
            let (status, _, body) = get(&api, "/").await;
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
            assert_eq!(body, "no breakfasts available\n");
        }

        let (status, _, text) = get(&ops, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        let prefix = format!("{REQUEST_DURATION}_count{{");
        let failed: Vec<&str> = text
            .lines()
            .filter(|line| line.starts_with(&prefix))
            .filter(|line| {
                line.contains(r#"component="API""#)
                    && line.contains(r#"operation="/""#)
                    && line.contains(r#"success="false""#)
            })
            .collect();
        assert_eq!(failed.len(), 1, "{text}");
        assert!(failed[0].ends_with(" 2"), "{}", failed[0]);
        assert!(!text
            .lines()
            .filter(|line| line.starts_with(&prefix))
            .any(|line| line.contains(r#"component="API""#) && line.contains(r#"success="true""#)));
    }

    #[tokio::test]
    async fn admin_wrong_method_and_redirect() {
        let (module, _) = module(breakfasts());
        let router = module.build_api_router();

        let (status, _, body) = get(&router, "/admin?code=503").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, "admin returning 503\n");

        let post = Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(post).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let (status, headers, _) = get(&router, "/admin/").await;
        assert_eq!(status, StatusCode::MOVED_PERMANENTLY);
        assert_eq!(headers[LOCATION], "/admin");
    }

    #[tokio::test]
    async fn health_routes() {
        let (module, _) = module(breakfasts());
        let ops = module.build_ops_router();

        let (status, _, _) = get(&ops, "/health/live").await;
        assert_eq!(status, StatusCode::OK);
        let (status, _, _) = get(&ops, "/health/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let (_, _, body) = get(&ops, "/health").await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["state"], "starting");
    }

    #[tokio::test]
    async fn start_binds_to_os_assigned_ports() {
        let (mut module, _) = module(breakfasts());
        let (api, metrics) = module.start().await.expect("start should succeed");
        assert!(api.port() > 0);
        assert!(metrics.port() > 0);
        assert_ne!(api, metrics);
        assert!(module.api_listener.is_some());
    }

    #[tokio::test]
    async fn serve_fails_without_start() {
        let (module, _) = module(breakfasts());
        let err = module.serve(std::future::pending::<()>()).await.unwrap_err();
        assert!(err.to_string().contains("start() must be called before serve()"));
    }

    #[tokio::test]
    async fn serves_over_tcp_and_shuts_down() {
        let (mut module, _) = module(breakfasts());
        let controller = module.shutdown_controller();
        let (api_addr, _) = module.start().await.unwrap();

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(module.serve(async move {
            let _ = stop_rx.await;
        }));

        let mut stream = tokio::net::TcpStream::connect(api_addr).await.unwrap();
        let request = b"GET /breakfasts/7 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
        stream.write_all(request).await.unwrap();
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let reply = String::from_utf8_lossy(&raw);
        assert!(reply.starts_with("HTTP/1.1 200"), "{reply}");
        assert!(reply.contains("Waffles"));
        assert_eq!(controller.health_state(), HealthState::Ready);

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
        assert_eq!(controller.health_state(), HealthState::Stopped);
    }
}
