//! Config struct and loading logic.
//!
//! Priority (highest to lowest):
//! 1. Environment variables
//! 2. An explicit `--config` file
//! 3. `.prscore.toml` in the working directory
//! 4. `~/.config/prscore/config.toml` (global defaults)
//! 5. Built-in defaults
//!
//! Every file is read as a [`ConfigPatch`] and folded with [`merge_config`],
//! so a layer only overrides the leaves it actually names.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::patch::{ConfigPatch, merge_config};
use crate::env::Env;
use crate::models::ModelProvider;
use crate::models::score::ScoreDimension;

/// Errors during config loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Default issue-key pattern, e.g. `PROJ-123`.
pub const DEFAULT_KEY_PATTERN: &str = r"[A-Z][A-Z0-9]+-\d+";

/// Fully resolved configuration, threaded immutably through every stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Graph-expansion bound handed to the issue and knowledge providers.
    pub expand_depth: u32,
    /// Ranked documents kept after aggregation.
    pub top_k: usize,
    pub max_files: usize,
    pub max_patch_chars_per_file: usize,
    /// Case-insensitive regex used for issue-key extraction.
    pub jira_key_pattern: String,
    pub providers: ProvidersConfig,
    pub llm: LlmConfig,
    pub post: PostConfig,
    pub resilience: ResilienceConfig,
    pub observability: ObservabilityConfig,
    pub scoring: ScoringConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            expand_depth: 1,
            top_k: 20,
            max_files: 80,
            max_patch_chars_per_file: 4000,
            jira_key_pattern: DEFAULT_KEY_PATTERN.to_string(),
            providers: ProvidersConfig::default(),
            llm: LlmConfig::default(),
            post: PostConfig::default(),
            resilience: ResilienceConfig::default(),
            observability: ObservabilityConfig::default(),
            scoring: ScoringConfig::default(),
        }
    }
}

/// Upstream connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub github: ConnectionConfig,
    pub jira: ConnectionConfig,
    pub confluence: ConfluenceConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            github: ConnectionConfig {
                domain: "https://api.github.com".to_string(),
                credential: Credential::default(),
            },
            jira: ConnectionConfig::default(),
            confluence: ConfluenceConfig::default(),
        }
    }
}

/// Base URL plus credential for one upstream system.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub domain: String,
    pub credential: Credential,
}

impl ConnectionConfig {
    /// Whether a domain has been set.
    pub fn is_configured(&self) -> bool {
        !self.domain.trim().is_empty()
    }
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credential {
    pub token: Option<String>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfluenceConfig {
    pub domain: String,
    pub credential: Credential,
    /// Issue keyword and key searches in addition to strong links.
    pub enable_expanded_search: bool,
}

impl ConfluenceConfig {
    pub fn connection(&self) -> ConnectionConfig {
        ConnectionConfig {
            domain: self.domain.clone(),
            credential: self.credential.clone(),
        }
    }
}

/// Which generative backend answers prompts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmMode {
    /// A real model through rig-core.
    #[default]
    Rig,
    /// Deterministic canned payloads.
    Mock,
}

impl std::str::FromStr for LlmMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rig" => Ok(LlmMode::Rig),
            "mock" => Ok(LlmMode::Mock),
            other => Err(format!("unsupported llm mode: '{other}'. Supported: rig, mock")),
        }
    }
}

/// Generative backend configuration.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub mode: LlmMode,
    pub provider: ModelProvider,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("mode", &self.mode)
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            mode: LlmMode::Rig,
            provider: ModelProvider::Anthropic,
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: None,
            api_key: None,
        }
    }
}

/// Publish-gate policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostConfig {
    pub enabled: bool,
    pub require_confirmation: bool,
}

impl Default for PostConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            require_confirmation: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Substitute an empty knowledge context when that stage fails.
    pub continue_on_knowledge_base_error: bool,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            continue_on_knowledge_base_error: true,
        }
    }
}

/// Lifecycle event settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// When false, no lifecycle event leaves the orchestrator.
    pub enabled: bool,
    /// Mirror lifecycle events into `tracing` logs.
    pub verbose_logs: bool,
    /// Max characters of prompt/response text carried in LLM events.
    pub preview_chars: usize,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            verbose_logs: false,
            preview_chars: 2000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
}

/// Per-dimension default weights, used when the backend omits one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    #[serde(alias = "Correctness")]
    pub correctness: f64,
    #[serde(alias = "Maintainability")]
    pub maintainability: f64,
    #[serde(alias = "Reliability")]
    pub reliability: f64,
    #[serde(alias = "Security")]
    pub security: f64,
    #[serde(alias = "Performance")]
    pub performance: f64,
    #[serde(alias = "Test Quality")]
    pub test_quality: f64,
    #[serde(alias = "Traceability")]
    pub traceability: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            correctness: 0.24,
            maintainability: 0.14,
            reliability: 0.18,
            security: 0.14,
            performance: 0.10,
            test_quality: 0.10,
            traceability: 0.10,
        }
    }
}

impl ScoringWeights {
    pub fn get(&self, dimension: ScoreDimension) -> f64 {
        match dimension {
            ScoreDimension::Correctness => self.correctness,
            ScoreDimension::Maintainability => self.maintainability,
            ScoreDimension::Reliability => self.reliability,
            ScoreDimension::Security => self.security,
            ScoreDimension::Performance => self.performance,
            ScoreDimension::TestQuality => self.test_quality,
            ScoreDimension::Traceability => self.traceability,
        }
    }

    pub(crate) fn slot_mut(&mut self, dimension: ScoreDimension) -> &mut f64 {
        match dimension {
            ScoreDimension::Correctness => &mut self.correctness,
            ScoreDimension::Maintainability => &mut self.maintainability,
            ScoreDimension::Reliability => &mut self.reliability,
            ScoreDimension::Security => &mut self.security,
            ScoreDimension::Performance => &mut self.performance,
            ScoreDimension::TestQuality => &mut self.test_quality,
            ScoreDimension::Traceability => &mut self.traceability,
        }
    }
}

impl Config {
    /// Load configuration with proper layering.
    ///
    /// Reads the global config, the repo-local config, an optional explicit
    /// file, then applies environment variable overrides.
    pub fn load(
        repo_root: Option<&Path>,
        explicit: Option<&Path>,
        env: &Env,
    ) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // Layer 4: global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                config = merge_config(&config, &Self::load_file(&global_path)?);
            }
        }

        // Layer 3: repo-local config
        if let Some(root) = repo_root {
            let local_path = root.join(crate::constants::CONFIG_FILENAME);
            if local_path.exists() {
                config = merge_config(&config, &Self::load_file(&local_path)?);
            }
        }

        // Layer 2: explicit file (must exist)
        if let Some(path) = explicit {
            config = merge_config(&config, &Self::load_file(path)?);
        }

        // Layer 1: environment variables
        config = merge_config(&config, &ConfigPatch::from_env(env));

        if config.llm.api_key.is_none() {
            config.llm.api_key = env.var(config.llm.provider.api_key_env_var());
        }

        tracing::debug!(?config, "configuration resolved");
        Ok(config)
    }

    /// Read one config file as a partial patch.
    pub fn load_file(path: &Path) -> Result<ConfigPatch, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the global config file path.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(crate::constants::CONFIG_DIR).join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.expand_depth, 1);
        assert_eq!(config.top_k, 20);
        assert_eq!(config.max_files, 80);
        assert_eq!(config.max_patch_chars_per_file, 4000);
        assert_eq!(config.jira_key_pattern, r"[A-Z][A-Z0-9]+-\d+");
        assert!(config.post.enabled);
        assert!(config.post.require_confirmation);
        assert!(config.resilience.continue_on_knowledge_base_error);
        assert!(config.observability.enabled);
        assert!(!config.providers.confluence.enable_expanded_search);
        assert_eq!(config.providers.github.domain, "https://api.github.com");
    }

    #[test]
    fn default_weights_sum_to_one() {
        let weights = ScoringWeights::default();
        let sum: f64 = ScoreDimension::all().into_iter().map(|d| weights.get(d)).sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert_eq!(weights.get(ScoreDimension::Correctness), 0.24);
        assert_eq!(weights.get(ScoreDimension::TestQuality), 0.10);
    }

    #[test]
    fn weights_accept_display_names() {
        let weights: ScoringWeights = toml::from_str("\"Test Quality\" = 0.3\nSecurity = 0.2").unwrap();
        assert_eq!(weights.test_quality, 0.3);
        assert_eq!(weights.security, 0.2);
        assert_eq!(weights.correctness, 0.24);
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = Config::default();
        config.llm.api_key = Some("sk-secret".into());
        config.providers.jira.credential.token = Some("jira-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("jira-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn llm_mode_from_str() {
        assert_eq!("MOCK".parse::<LlmMode>().unwrap(), LlmMode::Mock);
        assert!("local".parse::<LlmMode>().is_err());
    }

    #[test]
    fn load_file_reads_toml_patch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.toml");
        std::fs::write(
            &path,
            r#"
top_k = 5

[providers.jira]
domain = "https://example.atlassian.net"
"#,
        )
        .unwrap();

        let patch = Config::load_file(&path).unwrap();
        assert_eq!(patch.top_k, Some(5));
        let jira = patch.providers.unwrap().jira.unwrap();
        assert_eq!(jira.domain.as_deref(), Some("https://example.atlassian.net"));
    }

    #[test]
    fn load_file_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "not valid {{ toml").unwrap();

        let result = Config::load_file(&path);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("parse"));
    }

    #[test]
    fn load_file_not_found() {
        let result = Config::load_file(Path::new("/tmp/prscore_not_exist_config.toml"));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read"));
    }

    #[test]
    fn load_from_repo_root_keeps_unnamed_leaves() {
        let env = Env::mock(Vec::<(&str, &str)>::new());

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".prscore.toml"),
            r#"
[scoring.weights]
Security = 0.4

[post]
enabled = false
"#,
        )
        .unwrap();

        let config = Config::load(Some(dir.path()), None, &env).unwrap();
        assert_eq!(config.scoring.weights.security, 0.4);
        assert_eq!(config.scoring.weights.correctness, 0.24);
        assert!(!config.post.enabled);
        assert!(config.post.require_confirmation);
    }

    #[test]
    fn explicit_file_overrides_repo_file() {
        let env = Env::mock(Vec::<(&str, &str)>::new());
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".prscore.toml"), "top_k = 5\nmax_files = 10").unwrap();
        let explicit = dir.path().join("ci.toml");
        std::fs::write(&explicit, "top_k = 7").unwrap();

        let config = Config::load(Some(dir.path()), Some(&explicit), &env).unwrap();
        assert_eq!(config.top_k, 7);
        assert_eq!(config.max_files, 10);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let env = Env::mock(Vec::<(&str, &str)>::new());
        let result = Config::load(None, Some(Path::new("/tmp/prscore_missing.toml")), &env);
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }

    #[test]
    fn env_overrides_files() {
        let env = Env::mock([("PRSCORE_MODEL", "gpt-4o"), ("PRSCORE_LLM_PROVIDER", "openai")]);
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".prscore.toml"),
            "[llm]\nmodel = \"claude-3-haiku\"\n",
        )
        .unwrap();

        let config = Config::load(Some(dir.path()), None, &env).unwrap();
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.provider, ModelProvider::OpenAI);
    }

    #[test]
    fn vendor_api_key_fallback() {
        let env = Env::mock([("ANTHROPIC_API_KEY", "sk-anthropic-test")]);
        let config = Config::load(None, None, &env).unwrap();
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-anthropic-test"));
    }

    #[test]
    fn global_config_path_mentions_app() {
        if let Some(p) = Config::global_config_path() {
            assert!(p.to_string_lossy().contains("prscore"));
        }
    }
}
