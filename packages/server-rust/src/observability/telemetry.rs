//! Console diagnostics bootstrap.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Console output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Filter directive used when `RUST_LOG` is unset.
#[must_use]
pub fn default_directive(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "info"
    }
}

/// Installs the global subscriber. With `debug`, span close events are
/// printed so per-stage spans show up on the console.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init(debug: bool, format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    let span_events = if debug { FmtSpan::CLOSE } else { FmtSpan::NONE };
    let console = tracing_subscriber::fmt::layer().with_span_events(span_events);
    let console = match format {
        LogFormat::Json => console.json().flatten_event(true).boxed(),
        LogFormat::Text => console.boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .try_init()?;
    Ok(())
}
