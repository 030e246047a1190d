//! Pipeline lifecycle events.
//!
//! The orchestrator reports what it is doing through a [`ReviewObserver`].
//! Emission is fire-and-forget: an observer that panics is caught at the
//! [`EventSink`] boundary and logged, and never affects the run.
//!
//! Every event carries the run id (uuid v4) and an RFC 3339 timestamp.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use strum::Display;

/// Kind of lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    PipelineStarted,
    PipelineCompleted,
    PipelineFailed,
    StepStarted,
    StepSucceeded,
    StepFailed,
    /// A failed step was absorbed and replaced by an empty result.
    Degraded,
    LlmPrompt,
    LlmResponse,
    LlmError,
}

/// One lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEvent {
    pub run_id: String,
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub timestamp: String,
}

/// Receives lifecycle events. Implementations must not block for long.
pub trait ReviewObserver: Send + Sync {
    fn emit(&self, event: &ReviewEvent);
}

/// Discards everything.
pub struct NoopObserver;

impl ReviewObserver for NoopObserver {
    fn emit(&self, _event: &ReviewEvent) {}
}

/// Keeps every event in memory, in order.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ReviewEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ReviewEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// `(kind, step)` pairs, for compact assertions.
    pub fn trail(&self) -> Vec<(EventKind, Option<String>)> {
        self.events()
            .into_iter()
            .map(|e| (e.kind, e.step))
            .collect()
    }
}

impl ReviewObserver for RecordingObserver {
    fn emit(&self, event: &ReviewEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Mirrors events into `tracing` at a level matching their severity.
pub struct TracingObserver;

impl ReviewObserver for TracingObserver {
    fn emit(&self, event: &ReviewEvent) {
        let step = event.step.as_deref().unwrap_or("-");
        let message = event.message.as_deref().unwrap_or("");
        match event.kind {
            EventKind::PipelineFailed | EventKind::StepFailed | EventKind::LlmError => {
                tracing::error!(run_id = %event.run_id, kind = %event.kind, step, duration_ms = ?event.duration_ms, "{message}")
            }
            EventKind::Degraded => {
                tracing::warn!(run_id = %event.run_id, kind = %event.kind, step, "{message}")
            }
            EventKind::LlmPrompt | EventKind::LlmResponse => {
                tracing::debug!(run_id = %event.run_id, kind = %event.kind, duration_ms = ?event.duration_ms, "{message}")
            }
            _ => {
                tracing::info!(run_id = %event.run_id, kind = %event.kind, step, duration_ms = ?event.duration_ms, "{message}")
            }
        }
    }
}

/// Forwards each event to several observers.
pub struct FanoutObserver {
    observers: Vec<Arc<dyn ReviewObserver>>,
}

impl FanoutObserver {
    pub fn new(observers: Vec<Arc<dyn ReviewObserver>>) -> Self {
        Self { observers }
    }
}

impl ReviewObserver for FanoutObserver {
    fn emit(&self, event: &ReviewEvent) {
        for observer in &self.observers {
            observer.emit(event);
        }
    }
}

/// Per-run handle that stamps and delivers events.
#[derive(Clone)]
pub struct EventSink {
    observer: Arc<dyn ReviewObserver>,
    run_id: String,
    enabled: bool,
}

impl EventSink {
    /// A sink for a new run with a fresh run id.
    pub fn new(observer: Arc<dyn ReviewObserver>, enabled: bool) -> Self {
        Self {
            observer,
            run_id: uuid::Uuid::new_v4().to_string(),
            enabled,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn emit(
        &self,
        kind: EventKind,
        step: Option<&str>,
        message: Option<String>,
        duration: Option<Duration>,
    ) {
        if !self.enabled {
            return;
        }
        let event = ReviewEvent {
            run_id: self.run_id.clone(),
            kind,
            step: step.map(str::to_string),
            message,
            duration_ms: duration.map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        let delivered = catch_unwind(AssertUnwindSafe(|| self.observer.emit(&event)));
        if delivered.is_err() {
            tracing::warn!(kind = %kind, "observer panicked; event dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PanickingObserver;

    impl ReviewObserver for PanickingObserver {
        fn emit(&self, _event: &ReviewEvent) {
            panic!("observer exploded");
        }
    }

    #[test]
    fn kind_names_are_snake_case() {
        assert_eq!(EventKind::StepSucceeded.to_string(), "step_succeeded");
        let json = serde_json::to_string(&EventKind::LlmPrompt).unwrap();
        assert_eq!(json, "\"llm_prompt\"");
    }

    #[test]
    fn sink_stamps_run_id_and_timestamp() {
        let recorder = Arc::new(RecordingObserver::new());
        let sink = EventSink::new(recorder.clone(), true);
        sink.emit(
            EventKind::StepStarted,
            Some("aggregate-context"),
            None,
            Some(Duration::from_millis(5)),
        );

        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].run_id, sink.run_id());
        assert_eq!(events[0].duration_ms, Some(5));
        assert!(chrono::DateTime::parse_from_rfc3339(&events[0].timestamp).is_ok());
        uuid::Uuid::parse_str(&events[0].run_id).expect("run id should be a uuid");
    }

    #[test]
    fn disabled_sink_emits_nothing() {
        let recorder = Arc::new(RecordingObserver::new());
        let sink = EventSink::new(recorder.clone(), false);
        sink.emit(EventKind::PipelineStarted, None, None, None);
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn panicking_observer_is_contained() {
        let sink = EventSink::new(Arc::new(PanickingObserver), true);
        sink.emit(EventKind::PipelineStarted, None, None, None);
    }

    #[test]
    fn fanout_reaches_every_observer() {
        let a = Arc::new(RecordingObserver::new());
        let b = Arc::new(RecordingObserver::new());
        let observers: Vec<Arc<dyn ReviewObserver>> = vec![a.clone() as Arc<dyn ReviewObserver>, b.clone()];
        let sink = EventSink::new(Arc::new(FanoutObserver::new(observers)), true);
        sink.emit(EventKind::Degraded, Some("fetch-knowledge-context"), None, None);
        assert_eq!(a.trail(), b.trail());
        assert_eq!(a.trail()[0].0, EventKind::Degraded);
    }

    #[test]
    fn event_serializes_camel_case_without_empty_fields() {
        let event = ReviewEvent {
            run_id: "r".into(),
            kind: EventKind::PipelineCompleted,
            step: None,
            message: None,
            duration_ms: Some(12),
            timestamp: "2024-01-01T00:00:00+00:00".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["durationMs"], 12);
        assert_eq!(json["kind"], "pipeline_completed");
        assert!(json.get("step").is_none());
    }
}
