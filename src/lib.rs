//! prscore: context-aware pull request scoring (library crate).
//!
//! Re-exports public modules for integration tests and external use.

pub mod config;
pub mod constants;
pub mod env;
pub mod llm;
pub mod models;
pub mod orchestrator;
pub mod output;
pub mod progress;
pub mod providers;
pub mod stages;
pub mod telemetry;
