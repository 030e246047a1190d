//! App-wide constants.
//!
//! Centralises the tool name, config paths and environment variable
//! names so a rename only requires changing this file.

/// Display name of the tool (lowercase).
pub const APP_NAME: &str = "prscore";

/// Crate version baked in at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Compilation target triple (set by `build.rs`).
pub const TARGET: &str = env!("TARGET");

/// Local config filename (e.g. `.prscore.toml` in repo root).
pub const CONFIG_FILENAME: &str = ".prscore.toml";

/// Directory name under `~/.config/` for global config.
pub const CONFIG_DIR: &str = "prscore";

// ── Environment variable names ──────────────────────────────────────

pub const ENV_LOG: &str = "PRSCORE_LOG";
pub const ENV_GITHUB_TOKEN: &str = "PRSCORE_GITHUB_TOKEN";
pub const ENV_JIRA_TOKEN: &str = "PRSCORE_JIRA_TOKEN";
pub const ENV_CONFLUENCE_TOKEN: &str = "PRSCORE_CONFLUENCE_TOKEN";
pub const ENV_LLM_MODE: &str = "PRSCORE_LLM_MODE";
pub const ENV_LLM_PROVIDER: &str = "PRSCORE_LLM_PROVIDER";
pub const ENV_MODEL: &str = "PRSCORE_MODEL";
pub const ENV_API_KEY: &str = "PRSCORE_API_KEY";
pub const ENV_BASE_URL: &str = "PRSCORE_BASE_URL";
pub const ENV_OBSERVABILITY: &str = "PRSCORE_OBSERVABILITY";
