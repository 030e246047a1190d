//! Generator wrapper that reports every call as `llm_*` lifecycle events.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::telemetry::{EventKind, EventSink};

use super::prompts::PromptKind;
use super::{LlmError, TextGenerator};

/// Floor for the number of characters kept from a preview.
const MIN_PREVIEW_CHARS: usize = 20;

/// Shorten `text` to roughly `max` characters, noting how much was cut.
pub fn truncate_preview(text: &str, max: usize) -> String {
    let len = text.chars().count();
    if len <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(20).max(MIN_PREVIEW_CHARS);
    if len <= keep {
        return text.to_string();
    }
    let head: String = text.chars().take(keep).collect();
    format!("{head}\n...[TRUNCATED {} chars]", len - keep)
}

pub struct TracedGenerator {
    inner: Arc<dyn TextGenerator>,
    sink: EventSink,
    preview_chars: usize,
}

impl TracedGenerator {
    pub fn new(inner: Arc<dyn TextGenerator>, sink: EventSink, preview_chars: usize) -> Self {
        Self {
            inner,
            sink,
            preview_chars,
        }
    }
}

#[async_trait]
impl TextGenerator for TracedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let step = PromptKind::classify(prompt).as_str();
        self.sink.emit(
            EventKind::LlmPrompt,
            Some(step),
            Some(format!(
                "{} prompt ({} chars): {}",
                self.inner.describe(),
                prompt.chars().count(),
                truncate_preview(prompt, self.preview_chars)
            )),
            None,
        );

        let start = Instant::now();
        let result = self.inner.generate(prompt).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(text) => self.sink.emit(
                EventKind::LlmResponse,
                Some(step),
                Some(format!(
                    "response ({} chars): {}",
                    text.chars().count(),
                    truncate_preview(text, self.preview_chars)
                )),
                Some(elapsed),
            ),
            Err(e) => self.sink.emit(EventKind::LlmError, Some(step), Some(e.to_string()), Some(elapsed)),
        }
        result
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockGenerator;
    use crate::llm::prompts::SCORE_OUTPUT_SCHEMA;
    use crate::telemetry::RecordingObserver;

    struct Failing;

    #[async_trait]
    impl TextGenerator for Failing {
        async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
            Err(LlmError::ApiError("boom".into()))
        }
    }

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_preview("abc", 10), "abc");
    }

    #[test]
    fn long_text_is_cut_with_marker() {
        let text = "a".repeat(2100);
        let preview = truncate_preview(&text, 2000);
        assert!(preview.starts_with(&"a".repeat(1980)));
        assert!(preview.ends_with("...[TRUNCATED 120 chars]"));
    }

    #[test]
    fn tiny_limit_keeps_floor() {
        let preview = truncate_preview(&"b".repeat(50), 5);
        assert!(preview.starts_with(&"b".repeat(20)));
        assert!(preview.ends_with("[TRUNCATED 30 chars]"));
    }

    #[test]
    fn marker_counts_every_dropped_char() {
        let text = "c".repeat(300);
        let preview = truncate_preview(&text, 100);
        let (head, marker) = preview.split_once('\n').unwrap();
        assert_eq!(head.len(), 80);
        assert_eq!(marker, "...[TRUNCATED 220 chars]");
    }

    #[test]
    fn text_within_floor_is_untouched() {
        assert_eq!(truncate_preview("short text", 5), "short text");
    }

    #[tokio::test]
    async fn emits_prompt_and_response() {
        let recorder = Arc::new(RecordingObserver::new());
        let sink = EventSink::new(recorder.clone(), true);
        let traced = TracedGenerator::new(Arc::new(MockGenerator), sink, 2000);

        traced.generate(&format!("schema {SCORE_OUTPUT_SCHEMA}")).await.unwrap();

        let trail = recorder.trail();
        assert_eq!(
            trail,
            vec![
                (EventKind::LlmPrompt, Some("score-change".to_string())),
                (EventKind::LlmResponse, Some("score-change".to_string())),
            ]
        );
        assert!(recorder.events()[0].message.as_deref().unwrap().starts_with("provider=mock"));
    }

    #[tokio::test]
    async fn emits_error_and_passes_it_through() {
        let recorder = Arc::new(RecordingObserver::new());
        let traced = TracedGenerator::new(Arc::new(Failing), EventSink::new(recorder.clone(), true), 100);

        let err = traced.generate("anything").await.unwrap_err();
        assert!(err.to_string().contains("boom"));
        let trail = recorder.trail();
        assert_eq!(trail[1], (EventKind::LlmError, Some("unknown".to_string())));
    }
}
