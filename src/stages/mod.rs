//! Pipeline stages.
//!
//! Each stage is a stateless unit struct with one `run` operation taking
//! its typed input and the shared [`StageContext`]. Stages never call
//! each other; the orchestrator hands outputs forward.

pub mod aggregate;
pub mod change;
pub mod draft;
pub mod issues;
pub mod keys;
pub mod knowledge;
pub mod publish;
pub mod score;

use std::sync::Arc;

use thiserror::Error;

use crate::config::Config;
use crate::llm::prompts::TemplateError;
use crate::llm::{LlmError, TextGenerator};
use crate::models::change::LocatorError;
use crate::providers::{ProviderError, ProviderSet};

pub use aggregate::{AggregateInput, AggregateStage};
pub use change::{FetchChangeStage, FetchedChange};
pub use draft::DraftStage;
pub use issues::FetchIssuesStage;
pub use keys::{ExtractKeysStage, IssueKeys};
pub use knowledge::FetchKnowledgeStage;
pub use publish::PublishStage;
pub use score::ScoreStage;

/// Errors raised by a stage.
///
/// Upstream and generator failures pass through unchanged.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("invalid PR link: {0}")]
    InvalidLocator(#[from] LocatorError),

    #[error("no issue key found in the PR title, branches, comments or commit messages")]
    NoIssueKeys,

    #[error("invalid issue key pattern '{pattern}': {message}")]
    InvalidKeyPattern { pattern: String, message: String },

    #[error(transparent)]
    Upstream(#[from] ProviderError),

    #[error(transparent)]
    Generation(#[from] LlmError),

    #[error("failed to parse generator response: {0}")]
    Parse(String),

    #[error("invalid score: {0}")]
    Validation(String),

    #[error("publishing is disabled by configuration")]
    PublishDisabled,

    #[error("publishing requires explicit confirmation")]
    ConfirmationRequired,

    #[error("edited comment body cannot be empty")]
    EmptyBody,

    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Static identity of a stage, used for event step names and progress rows.
pub trait Stage {
    const ID: &'static str;
    const DESCRIPTION: &'static str;
}

/// One-line, human-readable description of what a stage produced.
pub trait StepSummary {
    fn summary(&self) -> String;
}

/// Resolved configuration and collaborators shared by every stage of a run.
#[derive(Clone)]
pub struct StageContext {
    pub config: Arc<Config>,
    pub providers: ProviderSet,
    pub generator: Arc<dyn TextGenerator>,
}

impl StageContext {
    pub fn new(config: Arc<Config>, providers: ProviderSet, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            config,
            providers,
            generator,
        }
    }
}
