#![forbid(unsafe_code)]

//! Tracing span names, fields, and nesting emitted by the engine.
//!
//! Run:
//!   cargo test -p urlsync-core --test tracing_spans

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use urlsync_core::{AddressingMode, FlatState, SyncConfig, UrlStateSync};
use urlsync_web::{MemoryHost, NullHost};

// ============================================================================
// Capture layer
// ============================================================================

#[derive(Debug, Clone)]
struct CapturedSpan {
    name: String,
    fields: HashMap<String, String>,
    parent_name: Option<String>,
}

#[derive(Debug, Clone)]
struct CapturedEvent {
    message: String,
    parent_span_name: Option<String>,
}

#[derive(Default)]
struct Captured {
    spans: Mutex<Vec<CapturedSpan>>,
    events: Mutex<Vec<CapturedEvent>>,
}

impl Captured {
    fn spans(&self) -> Vec<CapturedSpan> {
        self.spans.lock().unwrap().clone()
    }

    fn named(&self, name: &str) -> Vec<CapturedSpan> {
        self.spans().into_iter().filter(|s| s.name == name).collect()
    }

    fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }
}

struct SpanCapture(Arc<Captured>);

struct FieldVisitor(Vec<(String, String)>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.push((field.name().to_string(), format!("{value:?}")));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
}

impl<S> tracing_subscriber::Layer<S> for SpanCapture
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        _id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = FieldVisitor(Vec::new());
        attrs.record(&mut visitor);
        let parent_name = ctx
            .current_span()
            .id()
            .and_then(|pid| ctx.span(pid))
            .map(|span_ref| span_ref.name().to_string());
        self.0.spans.lock().unwrap().push(CapturedSpan {
            name: attrs.metadata().name().to_string(),
            fields: visitor.0.into_iter().collect(),
            parent_name,
        });
    }

    fn on_event(&self, event: &tracing::Event<'_>, ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = FieldVisitor(Vec::new());
        event.record(&mut visitor);
        let message = visitor
            .0
            .into_iter()
            .find(|(k, _)| k == "message")
            .map(|(_, v)| v)
            .unwrap_or_default();
        let parent_span_name = ctx
            .current_span()
            .id()
            .and_then(|id| ctx.span(id))
            .map(|span_ref| span_ref.name().to_string());
        self.0.events.lock().unwrap().push(CapturedEvent {
            message,
            parent_span_name,
        });
    }
}

fn with_captured_spans<F: FnOnce()>(f: F) -> Arc<Captured> {
    let captured = Arc::new(Captured::default());
    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::filter::LevelFilter::TRACE)
        .with(SpanCapture(Arc::clone(&captured)));
    tracing::subscriber::with_default(subscriber, f);
    captured
}

fn engine(href: &str, config: SyncConfig) -> (Rc<MemoryHost>, UrlStateSync<MemoryHost>) {
    let host = Rc::new(MemoryHost::new(href));
    let sync = UrlStateSync::new(Rc::clone(&host), config);
    (host, sync)
}

// ============================================================================
// Span tests
// ============================================================================

#[test]
fn read_emits_project_span_with_field_count() {
    let captured = with_captured_spans(|| {
        let (_, sync) = engine("/?a=1", SyncConfig::new().with_fields(["a", "b"]));
        let _ = sync.read_initial_state(&FlatState::new());
    });

    let spans = captured.named("urlsync.project");
    assert_eq!(spans.len(), 1);
    assert!(spans[0].parent_name.is_none());
    assert_eq!(spans[0].fields.get("fields").map(String::as_str), Some("2"));
    assert_eq!(spans[0].fields.get("wildcard").map(String::as_str), Some("false"));
}

#[test]
fn serialize_span_carries_history_policy() {
    let captured = with_captured_spans(|| {
        let (_, sync) = engine("/", SyncConfig::new().with_fields(["a"]));
        sync.serialize_state_to_url(&FlatState::new().with("a", 1));
    });

    let spans = captured.named("urlsync.serialize");
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].fields.get("keys").map(String::as_str), Some("1"));
    assert_eq!(spans[0].fields.get("history").map(String::as_str), Some("Replace"));
}

#[test]
fn timer_driven_write_is_a_root_serialize_span() {
    let captured = with_captured_spans(|| {
        let (host, sync) = engine("/", SyncConfig::new().with_fields(["a"]));
        sync.schedule(FlatState::new().with("a", 1));
        host.advance(Duration::from_millis(200));
    });

    let schedule = captured.named("urlsync.schedule");
    assert_eq!(schedule.len(), 1);
    assert_eq!(
        schedule[0].fields.get("debounce_ms").map(String::as_str),
        Some("200")
    );

    let serialize = captured.named("urlsync.serialize");
    assert_eq!(serialize.len(), 1);
    assert!(
        serialize[0].parent_name.is_none(),
        "timer write must not nest under the schedule span, got {:?}",
        serialize[0].parent_name
    );
}

#[test]
fn navigation_span_parents_projection() {
    let captured = with_captured_spans(|| {
        let (host, sync) = engine(
            "/#/r?a=1",
            SyncConfig::new()
                .with_fields(["a"])
                .with_mode(AddressingMode::Fragment),
        );
        sync.attach_popstate_listener(|_| {});
        host.set_fragment("/r?a=2");
    });

    let navigation = captured.named("urlsync.navigation");
    assert_eq!(navigation.len(), 1);
    assert_eq!(
        navigation[0].fields.get("kind").map(String::as_str),
        Some("hashchange")
    );

    let project = captured.named("urlsync.project");
    assert_eq!(project.len(), 1);
    assert_eq!(project[0].parent_name.as_deref(), Some("urlsync.navigation"));
}

#[test]
fn unarmed_schedule_logs_degradation_inside_schedule_span() {
    let captured = with_captured_spans(|| {
        let sync = UrlStateSync::new(Rc::new(NullHost), SyncConfig::new());
        sync.schedule(FlatState::new().with("a", 1));
    });

    let degraded: Vec<_> = captured
        .events()
        .into_iter()
        .filter(|e| e.message.contains("degrades to immediate"))
        .collect();
    assert_eq!(degraded.len(), 1);
    assert_eq!(
        degraded[0].parent_span_name.as_deref(),
        Some("urlsync.schedule")
    );
    assert_eq!(captured.named("urlsync.serialize").len(), 1);
}

#[test]
fn every_span_uses_the_urlsync_namespace() {
    let captured = with_captured_spans(|| {
        let (host, sync) = engine("/?a=1", SyncConfig::new().with_fields(["a"]));
        sync.attach_popstate_listener(|_| {});
        let state = sync.read_initial_state(&FlatState::new());
        sync.schedule(state.clone());
        sync.flush(state);
        host.navigate("/?a=2");
        host.back();
        host.advance(Duration::from_secs(1));
    });

    let spans = captured.spans();
    assert!(!spans.is_empty());
    for span in &spans {
        assert!(
            span.name.starts_with("urlsync."),
            "unexpected span name {}",
            span.name
        );
    }
}
