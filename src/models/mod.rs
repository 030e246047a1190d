//! Shared types used across all modules.
//!
//! This module defines the records that flow between pipeline stages:
//! change, issue and knowledge-base context, the aggregated review
//! context, and the score. Other modules import from here rather than
//! reaching into each other's internals.

pub mod change;
pub mod context;
pub mod issue;
pub mod knowledge;
pub mod score;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use change::{ChangeContext, ChangeSourcePayload, SourceReference};
pub use context::{ReviewContext, ReviewOutcome, ReviewRequest};
pub use issue::{Issue, IssueContext};
pub use knowledge::{KnowledgeContext, KnowledgeDocument, Provenance};
pub use score::{Confidence, ScoreDimension, ScoreResult};

/// Review focus requested by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewProfile {
    #[default]
    Default,
    Security,
    Performance,
    Compliance,
}

impl fmt::Display for ReviewProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewProfile::Default => write!(f, "default"),
            ReviewProfile::Security => write!(f, "security"),
            ReviewProfile::Performance => write!(f, "performance"),
            ReviewProfile::Compliance => write!(f, "compliance"),
        }
    }
}

impl std::str::FromStr for ReviewProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(ReviewProfile::Default),
            "security" => Ok(ReviewProfile::Security),
            "performance" => Ok(ReviewProfile::Performance),
            "compliance" => Ok(ReviewProfile::Compliance),
            other => Err(format!(
                "unsupported review profile: '{other}'. Supported: default, security, performance, compliance"
            )),
        }
    }
}

/// Supported LLM vendors for the generative backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    #[default]
    Anthropic,
    #[serde(rename = "openai")]
    OpenAI,
    Gemini,
    #[serde(rename = "deepseek")]
    DeepSeek,
    Groq,
    /// Any OpenAI-compatible API (e.g. Ollama, local servers).
    #[serde(rename = "openai-compatible")]
    OpenAICompatible,
}

impl fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelProvider::Anthropic => write!(f, "anthropic"),
            ModelProvider::OpenAI => write!(f, "openai"),
            ModelProvider::Gemini => write!(f, "gemini"),
            ModelProvider::DeepSeek => write!(f, "deepseek"),
            ModelProvider::Groq => write!(f, "groq"),
            ModelProvider::OpenAICompatible => write!(f, "openai-compatible"),
        }
    }
}

impl std::str::FromStr for ModelProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anthropic" => Ok(ModelProvider::Anthropic),
            "openai" => Ok(ModelProvider::OpenAI),
            "gemini" => Ok(ModelProvider::Gemini),
            "deepseek" => Ok(ModelProvider::DeepSeek),
            "groq" => Ok(ModelProvider::Groq),
            "openai-compatible" => Ok(ModelProvider::OpenAICompatible),
            other => Err(format!(
                "unsupported model provider: '{other}'. Supported: anthropic, openai, \
                 gemini, deepseek, groq, openai-compatible"
            )),
        }
    }
}

impl ModelProvider {
    /// Returns the vendor-specific environment variable name for the API key.
    pub fn api_key_env_var(self) -> &'static str {
        match self {
            ModelProvider::Anthropic => "ANTHROPIC_API_KEY",
            ModelProvider::OpenAI | ModelProvider::OpenAICompatible => "OPENAI_API_KEY",
            ModelProvider::Gemini => "GEMINI_API_KEY",
            ModelProvider::DeepSeek => "DEEPSEEK_API_KEY",
            ModelProvider::Groq => "GROQ_API_KEY",
        }
    }
}
