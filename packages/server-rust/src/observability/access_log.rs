//! Access-log sinks: one structured entry per completed HTTP request.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use breakfast_core::LogFields;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Connect and write timeout for the remote collector.
const COLLECTOR_TIMEOUT: Duration = Duration::from_secs(1);

/// Entries buffered for the collector writer before new ones are dropped.
const COLLECTOR_QUEUE: usize = 1024;

/// Receives the flushed log accumulator of each request.
pub trait AccessLog: Send + Sync {
    fn emit(&self, fields: &LogFields);
}

/// Emits each entry as a `tracing` event at target `access`, rendered as
/// logfmt.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAccessLog;

impl AccessLog for TracingAccessLog {
    fn emit(&self, fields: &LogFields) {
        tracing::info!(target: "access", "{fields}");
    }
}

/// Discards every entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopAccessLog;

impl AccessLog for NopAccessLog {
    fn emit(&self, _fields: &LogFields) {}
}

/// Streams newline-delimited JSON objects to a TCP collector.
///
/// `emit` only encodes the entry and queues it; a background writer task
/// owns the connection. When the queue is full the entry is dropped with a
/// warning, so a slow collector never holds up a request.
#[derive(Debug, Clone)]
pub struct JsonLinesAccessLog {
    tx: mpsc::Sender<Vec<u8>>,
}

impl JsonLinesAccessLog {
    /// Connects to a line-oriented collector at `addr` (`host:port`) and
    /// starts the writer task.
    ///
    /// The writer exits once every clone of the returned sink is dropped
    /// and the queue is drained.
    ///
    /// # Errors
    ///
    /// Returns an error if `addr` does not resolve or the connection is not
    /// established within one second.
    pub async fn connect(addr: &str) -> io::Result<(Self, JoinHandle<()>)> {
        let stream = dial(addr).await?;
        let (tx, rx) = mpsc::channel(COLLECTOR_QUEUE);
        let writer = CollectorWriter {
            addr: addr.to_string(),
            stream: Some(stream),
            rx,
        };
        Ok((Self { tx }, tokio::spawn(writer.run())))
    }
}

impl AccessLog for JsonLinesAccessLog {
    fn emit(&self, fields: &LogFields) {
        let mut line = match serde_json::to_vec(fields) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to encode access log entry");
                return;
            }
        };
        line.push(b'\n');
        match self.tx.try_send(line) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Access log collector queue full, dropping entry");
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Access log writer stopped, dropping entry");
            }
        }
    }
}

async fn dial(addr: &str) -> io::Result<TcpStream> {
    match timeout(COLLECTOR_TIMEOUT, TcpStream::connect(addr)).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("connecting to {addr} timed out"),
        )),
    }
}

async fn write_line(stream: &mut TcpStream, line: &[u8]) -> io::Result<()> {
    match timeout(COLLECTOR_TIMEOUT, stream.write_all(line)).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "write to collector timed out",
        )),
    }
}

/// Owns the collector connection; redials after a failed write.
struct CollectorWriter {
    addr: String,
    stream: Option<TcpStream>,
    rx: mpsc::Receiver<Vec<u8>>,
}

impl CollectorWriter {
    async fn run(mut self) {
        while let Some(line) = self.rx.recv().await {
            if let Err(e) = self.write(&line).await {
                warn!(collector = %self.addr, error = %e, "Failed to write access log entry");
            }
        }
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        debug!(collector = %self.addr, "access log writer stopped");
    }

    async fn write(&mut self, line: &[u8]) -> io::Result<()> {
        if let Some(stream) = self.stream.as_mut() {
            match write_line(stream, line).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    debug!(collector = %self.addr, error = %e, "collector connection lost");
                    self.stream = None;
                }
            }
        }
        let mut stream = dial(&self.addr).await?;
        write_line(&mut stream, line).await?;
        self.stream = Some(stream);
        Ok(())
    }
}

/// Where access-log entries go.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AccessLogTarget {
    /// Console, through `tracing`.
    #[default]
    Tracing,
    /// Nowhere.
    Off,
    /// Newline-delimited JSON to a TCP collector at `host:port`.
    Tcp(String),
}

impl AccessLogTarget {
    /// Opens the sink for this target.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP collector cannot be reached.
    pub async fn open(&self) -> io::Result<OpenAccessLog> {
        Ok(match self {
            Self::Tracing => OpenAccessLog::new(Arc::new(TracingAccessLog), None),
            Self::Off => OpenAccessLog::new(Arc::new(NopAccessLog), None),
            Self::Tcp(addr) => {
                let (sink, writer) = JsonLinesAccessLog::connect(addr).await?;
                OpenAccessLog::new(Arc::new(sink), Some(writer))
            }
        })
    }
}

/// An opened access-log sink and, for the collector, its writer task.
pub struct OpenAccessLog {
    sink: Arc<dyn AccessLog>,
    writer: Option<JoinHandle<()>>,
}

impl OpenAccessLog {
    fn new(sink: Arc<dyn AccessLog>, writer: Option<JoinHandle<()>>) -> Self {
        Self { sink, writer }
    }

    #[must_use]
    pub fn sink(&self) -> Arc<dyn AccessLog> {
        Arc::clone(&self.sink)
    }

    /// Drops this handle's sink and waits up to `grace` for the writer to
    /// drain queued entries. Other clones of the sink must be gone already.
    pub async fn close(self, grace: Duration) {
        let Self { sink, writer } = self;
        drop(sink);
        let Some(writer) = writer else {
            return;
        };
        if timeout(grace, writer).await.is_err() {
            warn!("Access log writer did not drain within the grace period");
        }
    }
}

impl std::fmt::Debug for OpenAccessLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAccessLog")
            .field("writer", &self.writer.is_some())
            .finish_non_exhaustive()
    }
}
