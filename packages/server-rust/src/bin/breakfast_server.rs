//! Breakfast Solutions server binary.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use breakfast_server::cli::Cli;
use breakfast_server::network::NetworkModule;
use breakfast_server::observability::{telemetry, PrometheusDurations};
use breakfast_server::service::{build_api, JsonRepository};
use clap::Parser;
use tracing::info;

/// Interval between recorder upkeep runs.
const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.debug, cli.log_format)?;

    let service = cli.service_config()?;
    let network = cli.network_config();

    let repository = JsonRepository::load(&service.dataset_path, service.simulate_latency)
        .context("failed to load breakfast dataset")?;
    info!(
        path = %service.dataset_path.display(),
        breakfasts = repository.len(),
        "dataset loaded"
    );

    let access_log = service
        .access_log
        .open()
        .await
        .context("failed to open access log")?;
    let metrics = Arc::new(PrometheusDurations::new()?);
    let handler = build_api(&service, repository, access_log.sink());

    let upkeep = PrometheusDurations::spawn_upkeep(Arc::clone(&metrics), UPKEEP_INTERVAL);

    let grace = network.shutdown_grace;
    let mut module = NetworkModule::new(network, handler, Arc::clone(&metrics));
    module.start().await?;
    let result = module.serve(shutdown_signal()).await;

    upkeep.abort();
    metrics.run_upkeep();
    access_log.close(grace).await;
    info!("server stopped");
    result
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}
