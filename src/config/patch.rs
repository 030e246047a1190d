//! Deep-partial configuration overrides.
//!
//! A [`ConfigPatch`] mirrors [`Config`] with every leaf optional. Config
//! files, environment variables and library callers all produce patches,
//! and [`merge_config`] folds one over a resolved config leaf by leaf.

use serde::{Deserialize, Serialize};

use super::loader::{
    Config, ConfluenceConfig, ConnectionConfig, Credential, LlmMode, ScoringWeights,
};
use crate::constants;
use crate::env::Env;
use crate::models::ModelProvider;
use crate::models::score::ScoreDimension;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    pub expand_depth: Option<u32>,
    pub top_k: Option<usize>,
    pub max_files: Option<usize>,
    pub max_patch_chars_per_file: Option<usize>,
    pub jira_key_pattern: Option<String>,
    pub providers: Option<ProvidersPatch>,
    pub llm: Option<LlmPatch>,
    pub post: Option<PostPatch>,
    pub resilience: Option<ResiliencePatch>,
    pub observability: Option<ObservabilityPatch>,
    pub scoring: Option<ScoringPatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersPatch {
    pub github: Option<ConnectionPatch>,
    pub jira: Option<ConnectionPatch>,
    pub confluence: Option<ConfluencePatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialPatch {
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionPatch {
    pub domain: Option<String>,
    pub credential: Option<CredentialPatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfluencePatch {
    pub domain: Option<String>,
    pub credential: Option<CredentialPatch>,
    pub enable_expanded_search: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmPatch {
    pub mode: Option<LlmMode>,
    pub provider: Option<ModelProvider>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostPatch {
    pub enabled: Option<bool>,
    pub require_confirmation: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResiliencePatch {
    pub continue_on_knowledge_base_error: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityPatch {
    pub enabled: Option<bool>,
    pub verbose_logs: Option<bool>,
    pub preview_chars: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPatch {
    pub weights: Option<WeightsPatch>,
}

/// Individual weight overrides; unnamed dimensions keep their value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightsPatch {
    #[serde(alias = "Correctness")]
    pub correctness: Option<f64>,
    #[serde(alias = "Maintainability")]
    pub maintainability: Option<f64>,
    #[serde(alias = "Reliability")]
    pub reliability: Option<f64>,
    #[serde(alias = "Security")]
    pub security: Option<f64>,
    #[serde(alias = "Performance")]
    pub performance: Option<f64>,
    #[serde(alias = "Test Quality")]
    pub test_quality: Option<f64>,
    #[serde(alias = "Traceability")]
    pub traceability: Option<f64>,
}

impl WeightsPatch {
    fn get(&self, dimension: ScoreDimension) -> Option<f64> {
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

    /// Set a single dimension's override.
    pub fn with(mut self, dimension: ScoreDimension, weight: f64) -> Self {
        let slot = match dimension {
            ScoreDimension::Correctness => &mut self.correctness,
            ScoreDimension::Maintainability => &mut self.maintainability,
            ScoreDimension::Reliability => &mut self.reliability,
            ScoreDimension::Security => &mut self.security,
            ScoreDimension::Performance => &mut self.performance,
            ScoreDimension::TestQuality => &mut self.test_quality,
            ScoreDimension::Traceability => &mut self.traceability,
        };
        *slot = Some(weight);
        self
    }
}

fn set<T: Clone>(slot: &mut T, value: &Option<T>) {
    if let Some(v) = value {
        *slot = v.clone();
    }
}

fn set_opt<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if value.is_some() {
        *slot = value.clone();
    }
}

fn apply_credential(credential: &mut Credential, patch: &Option<CredentialPatch>) {
    if let Some(p) = patch {
        set_opt(&mut credential.token, &p.token);
    }
}

fn apply_connection(connection: &mut ConnectionConfig, patch: &Option<ConnectionPatch>) {
    if let Some(p) = patch {
        set(&mut connection.domain, &p.domain);
        apply_credential(&mut connection.credential, &p.credential);
    }
}

fn apply_confluence(confluence: &mut ConfluenceConfig, patch: &Option<ConfluencePatch>) {
    if let Some(p) = patch {
        set(&mut confluence.domain, &p.domain);
        apply_credential(&mut confluence.credential, &p.credential);
        set(&mut confluence.enable_expanded_search, &p.enable_expanded_search);
    }
}

fn apply_weights(weights: &mut ScoringWeights, patch: &WeightsPatch) {
    for dimension in ScoreDimension::all() {
        if let Some(w) = patch.get(dimension) {
            *weights.slot_mut(dimension) = w;
        }
    }
}

/// Fold `patch` over `base`, returning a new resolved config.
///
/// Only leaves the patch names are replaced; nested sections are never
/// swapped wholesale.
pub fn merge_config(base: &Config, patch: &ConfigPatch) -> Config {
    let mut config = base.clone();

    set(&mut config.expand_depth, &patch.expand_depth);
    set(&mut config.top_k, &patch.top_k);
    set(&mut config.max_files, &patch.max_files);
    set(&mut config.max_patch_chars_per_file, &patch.max_patch_chars_per_file);
    set(&mut config.jira_key_pattern, &patch.jira_key_pattern);

    if let Some(p) = &patch.providers {
        apply_connection(&mut config.providers.github, &p.github);
        apply_connection(&mut config.providers.jira, &p.jira);
        apply_confluence(&mut config.providers.confluence, &p.confluence);
    }

    if let Some(p) = &patch.llm {
        set(&mut config.llm.mode, &p.mode);
        set(&mut config.llm.provider, &p.provider);
        set(&mut config.llm.model, &p.model);
        set_opt(&mut config.llm.base_url, &p.base_url);
        set_opt(&mut config.llm.api_key, &p.api_key);
    }

    if let Some(p) = &patch.post {
        set(&mut config.post.enabled, &p.enabled);
        set(&mut config.post.require_confirmation, &p.require_confirmation);
    }

    if let Some(p) = &patch.resilience {
        set(
            &mut config.resilience.continue_on_knowledge_base_error,
            &p.continue_on_knowledge_base_error,
        );
    }

    if let Some(p) = &patch.observability {
        set(&mut config.observability.enabled, &p.enabled);
        set(&mut config.observability.verbose_logs, &p.verbose_logs);
        set(&mut config.observability.preview_chars, &p.preview_chars);
    }

    if let Some(weights) = patch.scoring.as_ref().and_then(|s| s.weights.as_ref()) {
        apply_weights(&mut config.scoring.weights, weights);
    }

    config
}

impl ConfigPatch {
    /// Collect overrides from `PRSCORE_*` environment variables.
    pub fn from_env(env: &Env) -> Self {
        let token = |name: &str| {
            env.var(name).map(|t| ConnectionPatch {
                domain: None,
                credential: Some(CredentialPatch { token: Some(t) }),
            })
        };

        let mut providers = ProvidersPatch {
            github: token(constants::ENV_GITHUB_TOKEN),
            jira: token(constants::ENV_JIRA_TOKEN),
            confluence: None,
        };
        if let Some(t) = env.var(constants::ENV_CONFLUENCE_TOKEN) {
            providers.confluence = Some(ConfluencePatch {
                credential: Some(CredentialPatch { token: Some(t) }),
                ..ConfluencePatch::default()
            });
        }

        let mut llm = LlmPatch::default();
        if let Some(val) = env.var(constants::ENV_LLM_MODE) {
            match val.parse::<LlmMode>() {
                Ok(mode) => llm.mode = Some(mode),
                Err(e) => tracing::warn!(variable = constants::ENV_LLM_MODE, "ignoring: {e}"),
            }
        }
        if let Some(val) = env.var(constants::ENV_LLM_PROVIDER) {
            match val.parse::<ModelProvider>() {
                Ok(provider) => llm.provider = Some(provider),
                Err(e) => tracing::warn!(variable = constants::ENV_LLM_PROVIDER, "ignoring: {e}"),
            }
        }
        llm.model = env.var(constants::ENV_MODEL);
        llm.base_url = env.var(constants::ENV_BASE_URL);
        llm.api_key = env.var(constants::ENV_API_KEY);

        let observability = env
            .flag(constants::ENV_OBSERVABILITY)
            .map(|enabled| ObservabilityPatch {
                enabled: Some(enabled),
                ..ObservabilityPatch::default()
            });

        Self {
            providers: Some(providers),
            llm: Some(llm),
            observability,
            ..Self::default()
        }
    }

    /// Patch overriding a single scoring weight.
    pub fn weight(dimension: ScoreDimension, weight: f64) -> Self {
        Self {
            scoring: Some(ScoringPatch {
                weights: Some(WeightsPatch::default().with(dimension, weight)),
            }),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_patch_is_identity() {
        let base = Config::default();
        assert_eq!(merge_config(&base, &ConfigPatch::default()), base);
    }

    #[test]
    fn one_weight_override_keeps_other_six() {
        let merged = merge_config(
            &Config::default(),
            &ConfigPatch::weight(ScoreDimension::Security, 0.5),
        );
        let expected = ScoringWeights {
            security: 0.5,
            ..ScoringWeights::default()
        };
        assert_eq!(merged.scoring.weights, expected);
    }

    #[test]
    fn provider_credential_merges_at_leaf() {
        let mut base = Config::default();
        base.providers.jira.domain = "https://example.atlassian.net".into();

        let patch = ConfigPatch {
            providers: Some(ProvidersPatch {
                jira: Some(ConnectionPatch {
                    domain: None,
                    credential: Some(CredentialPatch {
                        token: Some("t0k".into()),
                    }),
                }),
                ..ProvidersPatch::default()
            }),
            ..ConfigPatch::default()
        };

        let merged = merge_config(&base, &patch);
        assert_eq!(merged.providers.jira.domain, "https://example.atlassian.net");
        assert_eq!(merged.providers.jira.credential.token.as_deref(), Some("t0k"));
        assert_eq!(merged.providers.github, base.providers.github);
    }

    #[test]
    fn merge_does_not_mutate_base() {
        let base = Config::default();
        let patch = ConfigPatch {
            top_k: Some(3),
            post: Some(PostPatch {
                enabled: Some(false),
                require_confirmation: None,
            }),
            ..ConfigPatch::default()
        };
        let merged = merge_config(&base, &patch);
        assert_eq!(merged.top_k, 3);
        assert!(!merged.post.enabled);
        assert!(merged.post.require_confirmation);
        assert_eq!(base.top_k, 20);
    }

    #[test]
    fn patch_parses_from_partial_toml() {
        let patch: ConfigPatch = toml::from_str(
            r#"
[providers.confluence]
enable_expanded_search = true

[scoring.weights]
"Test Quality" = 0.2
"#,
        )
        .unwrap();
        let merged = merge_config(&Config::default(), &patch);
        assert!(merged.providers.confluence.enable_expanded_search);
        assert_eq!(merged.scoring.weights.test_quality, 0.2);
        assert_eq!(merged.scoring.weights.traceability, 0.10);
    }

    #[test]
    fn from_env_reads_tokens_and_llm() {
        let env = Env::mock([
            ("PRSCORE_GITHUB_TOKEN", "gh"),
            ("PRSCORE_CONFLUENCE_TOKEN", "cf"),
            ("PRSCORE_LLM_MODE", "mock"),
            ("PRSCORE_OBSERVABILITY", "off"),
        ]);
        let merged = merge_config(&Config::default(), &ConfigPatch::from_env(&env));
        assert_eq!(merged.providers.github.credential.token.as_deref(), Some("gh"));
        assert_eq!(merged.providers.confluence.credential.token.as_deref(), Some("cf"));
        assert!(merged.providers.jira.credential.token.is_none());
        assert_eq!(merged.llm.mode, LlmMode::Mock);
        assert!(!merged.observability.enabled);
    }

    #[test]
    fn from_env_ignores_invalid_provider() {
        let env = Env::mock([("PRSCORE_LLM_PROVIDER", "not-a-provider")]);
        let merged = merge_config(&Config::default(), &ConfigPatch::from_env(&env));
        assert_eq!(merged.llm.provider, ModelProvider::Anthropic);
    }
}
