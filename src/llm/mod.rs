//! Generative text backend.
//!
//! Stages only see the [`TextGenerator`] trait. [`rig::RigGenerator`] talks
//! to a real model through rig-core, [`mock::MockGenerator`] answers with
//! deterministic payloads, and [`traced::TracedGenerator`] wraps either to
//! emit `llm_*` lifecycle events.

pub mod json;
pub mod mock;
pub mod prompts;
pub mod rig;
pub mod traced;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{LlmConfig, LlmMode};

/// Errors from the generative backend.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM API error: {0}")]
    ApiError(String),

    #[error("LLM not configured: {0}")]
    NotConfigured(String),

    #[error("LLM returned an empty response")]
    Empty,
}

/// Prompt in, text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;

    /// Short human-readable identification, e.g. `provider=anthropic model=…`.
    fn describe(&self) -> String {
        "provider=unknown".to_string()
    }
}

/// Stands in where no model should be called, e.g. the publish gate.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconfigured;

#[async_trait]
impl TextGenerator for Unconfigured {
    async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::NotConfigured(
            "no generator is set up for this command".to_string(),
        ))
    }

    fn describe(&self) -> String {
        "provider=none".to_string()
    }
}

/// Build the generator selected by `llm.mode`.
pub fn from_config(config: &LlmConfig) -> Result<Arc<dyn TextGenerator>, LlmError> {
    match config.mode {
        LlmMode::Mock => Ok(Arc::new(mock::MockGenerator)),
        LlmMode::Rig => Ok(Arc::new(rig::RigGenerator::new(config.clone())?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_mode_needs_no_key() {
        let config = LlmConfig {
            mode: LlmMode::Mock,
            ..LlmConfig::default()
        };
        let generator = from_config(&config).unwrap();
        assert_eq!(generator.describe(), "provider=mock");
    }

    #[test]
    fn rig_mode_without_key_is_not_configured() {
        let err = from_config(&LlmConfig::default()).err().unwrap();
        assert!(matches!(err, LlmError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn unconfigured_refuses_every_prompt() {
        let err = Unconfigured.generate("Context:\n{}").await.unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured(_)));
    }
}
