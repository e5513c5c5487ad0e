use std::fmt;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::Span;

use crate::traits::DurationSink;
use crate::types::LogValue;

// ---------------------------------------------------------------------------
// LogFields
// ---------------------------------------------------------------------------

/// Ordered key/value accumulator for a single request's access-log line.
///
/// Keys keep insertion order so the emitted line reads in the order the
/// pipeline contributed them. Pushing an existing key appends a second entry;
/// [`LogFields::get`] returns the most recent one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogFields {
    entries: Vec<(&'static str, LogValue)>,
}

impl LogFields {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field.
    pub fn push(&mut self, key: &'static str, value: impl Into<LogValue>) {
        self.entries.push((key, value.into()));
    }

    /// Latest value recorded under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&LogValue> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&'static str, &LogValue)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for LogFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Renders as logfmt: `key=value` pairs separated by spaces. String values
/// containing whitespace, quotes or `=` are quoted.
impl fmt::Display for LogFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match value {
                LogValue::Str(s) if needs_quoting(s) => write!(f, "{key}={s:?}")?,
                other => write!(f, "{key}={other}")?,
            }
        }
        Ok(())
    }
}

fn needs_quoting(s: &str) -> bool {
    s.is_empty() || s.chars().any(|c| c.is_whitespace() || c == '"' || c == '=')
}

// ---------------------------------------------------------------------------
// RequestState
// ---------------------------------------------------------------------------

/// Per-request state threaded by `&mut` through every pipeline stage.
///
/// Always carries all three request-scoped slots: the log accumulator, the
/// shared duration sink, and the current trace span (initially
/// [`Span::none`]). Stages and decorators never have to handle a missing
/// attachment.
pub struct RequestState {
    log: LogFields,
    metrics: Arc<dyn DurationSink>,
    span: Span,
}

impl RequestState {
    #[must_use]
    pub fn new(metrics: Arc<dyn DurationSink>) -> Self {
        Self {
            log: LogFields::new(),
            metrics,
            span: Span::none(),
        }
    }

    /// Mutable access to the log accumulator.
    pub fn log(&mut self) -> &mut LogFields {
        &mut self.log
    }

    /// Read-only view of the log accumulator.
    #[must_use]
    pub fn log_fields(&self) -> &LogFields {
        &self.log
    }

    /// Takes the accumulated fields, leaving an empty accumulator behind.
    pub fn take_log(&mut self) -> LogFields {
        std::mem::take(&mut self.log)
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<dyn DurationSink> {
        &self.metrics
    }

    /// The span stages should parent new work under.
    #[must_use]
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Installs `span` as current and returns the previous one.
    pub fn replace_span(&mut self, span: Span) -> Span {
        std::mem::replace(&mut self.span, span)
    }
}

impl fmt::Debug for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestState")
            .field("log", &self.log)
            .field("span", &self.span)
            .finish_non_exhaustive()
    }
}
