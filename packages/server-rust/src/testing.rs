//! Shared fixtures for unit tests: an in-memory duration sink, an in-memory
//! access log, and a `tracing` layer that captures spans and events.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use breakfast_core::{Breakfast, DurationSink, LogFields, Observation, RequestState};
use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::level_filters::LevelFilter;
use tracing::span::{Attributes, Id};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::observability::AccessLog;

pub fn breakfasts() -> Vec<Breakfast> {
    vec![
        Breakfast {
            id: 42,
            name: "Pancakes".to_string(),
            image: "/images/pancakes.jpg".to_string(),
            description: "Fluffy, with maple syrup.".to_string(),
        },
        Breakfast {
            id: 7,
            name: "Waffles".to_string(),
            image: "/images/waffles.jpg".to_string(),
            description: "Crisp squares.".to_string(),
        },
        Breakfast {
            id: 3,
            name: "Omelette".to_string(),
            image: "/images/omelette.jpg".to_string(),
            description: "Three eggs, folded.".to_string(),
        },
    ]
}

pub fn state(sink: &Arc<RecordingSink>) -> RequestState {
    RequestState::new(Arc::clone(sink) as Arc<dyn DurationSink>)
}

// ---------------------------------------------------------------------------
// RecordingSink
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RecordingSink {
    observations: Mutex<Vec<Observation>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn observations(&self) -> Vec<Observation> {
        self.observations.lock().clone()
    }

    pub fn count(&self, component: &str, operation: &str, success: bool) -> usize {
        self.observations
            .lock()
            .iter()
            .filter(|o| {
                o.component == component && o.operation == operation && o.success == success
            })
            .count()
    }
}

impl DurationSink for RecordingSink {
    fn observe(&self, observation: Observation) {
        self.observations.lock().push(observation);
    }
}

// ---------------------------------------------------------------------------
// MemoryAccessLog
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryAccessLog {
    entries: Mutex<Vec<LogFields>>,
}

impl MemoryAccessLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn entries(&self) -> Vec<LogFields> {
        self.entries.lock().clone()
    }
}

impl AccessLog for MemoryAccessLog {
    fn emit(&self, fields: &LogFields) {
        self.entries.lock().push(fields.clone());
    }
}

// ---------------------------------------------------------------------------
// Span/event capture
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SpanRecord {
    pub id: u64,
    pub name: &'static str,
    pub parent: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct EventRecord {
    pub target: String,
    pub span: Option<&'static str>,
    pub span_id: Option<u64>,
    pub fields: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct Captured {
    spans: Arc<Mutex<Vec<SpanRecord>>>,
    events: Arc<Mutex<Vec<EventRecord>>>,
    closed: Arc<Mutex<Vec<u64>>>,
}

impl Captured {
    pub fn spans(&self) -> Vec<SpanRecord> {
        self.spans.lock().clone()
    }

    pub fn events(&self) -> Vec<EventRecord> {
        self.events.lock().clone()
    }

    /// Span ids in the order they closed.
    pub fn closed(&self) -> Vec<u64> {
        self.closed.lock().clone()
    }

    pub fn spans_named(&self, name: &str) -> Vec<SpanRecord> {
        self.spans().into_iter().filter(|s| s.name == name).collect()
    }

    /// Events emitted inside spans called `name`.
    pub fn events_in(&self, name: &str) -> Vec<EventRecord> {
        self.events()
            .into_iter()
            .filter(|e| e.span == Some(name))
            .collect()
    }
}

struct CaptureLayer {
    captured: Captured,
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let parent = ctx
            .span(id)
            .and_then(|span| span.parent())
            .map(|parent| parent.id().into_u64());
        self.captured.spans.lock().push(SpanRecord {
            id: id.into_u64(),
            name: attrs.metadata().name(),
            parent,
        });
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        let span = ctx.event_span(event);
        self.captured.events.lock().push(EventRecord {
            target: event.metadata().target().to_string(),
            span: span.as_ref().map(|s| s.name()),
            span_id: span.as_ref().map(|s| s.id().into_u64()),
            fields: visitor.fields,
        });
    }

    fn on_close(&self, id: Id, _ctx: Context<'_, S>) {
        self.captured.closed.lock().push(id.into_u64());
    }
}

#[derive(Default)]
struct FieldVisitor {
    fields: HashMap<String, String>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.fields.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.fields
            .insert(field.name().to_string(), format!("{value:?}"));
    }
}

/// Installs a capturing subscriber for the current thread until the guard
/// is dropped.
pub fn capture() -> (Captured, DefaultGuard) {
    capture_at(LevelFilter::TRACE)
}

/// Like [`capture`], dropping spans and events above `max`.
pub fn capture_at(max: LevelFilter) -> (Captured, DefaultGuard) {
    let captured = Captured::default();
    let subscriber = tracing_subscriber::registry().with(
        CaptureLayer {
            captured: captured.clone(),
        }
        .with_filter(max),
    );
    let guard = tracing::subscriber::set_default(subscriber);
    (captured, guard)
}
