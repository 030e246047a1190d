//! Configuration loading and layering.
//!
//! Handles `.prscore.toml` loading, environment variable resolution,
//! and the pure deep-partial merge every run goes through.

pub mod loader;
pub mod patch;

pub use loader::{
    Config, ConfigError, ConfluenceConfig, ConnectionConfig, Credential, DEFAULT_KEY_PATTERN,
    LlmConfig, LlmMode, ObservabilityConfig, PostConfig, ProvidersConfig, ResilienceConfig,
    ScoringConfig, ScoringWeights,
};
pub use patch::{ConfigPatch, merge_config};
