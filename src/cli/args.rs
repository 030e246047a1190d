//! Clap argument types and flag-to-config translation.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use prscore::config::ConfigPatch;
use prscore::config::loader::LlmMode;
use prscore::config::patch::LlmPatch;
use prscore::models::{ReviewOutcome, ReviewProfile, ReviewRequest};

/// Context-aware pull request scoring.
#[derive(Parser, Debug)]
#[command(
    name = "prscore",
    version = prscore::constants::VERSION,
    about = super::ABOUT_STYLED,
)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). `PRSCORE_LOG` wins when set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Gather context for a pull request, score it and draft a review comment.
    Review(Box<ReviewArgs>),

    /// Post an edited review comment on a pull request.
    Publish(PublishArgs),

    /// Print version and build information.
    Version,
}

/// Flags shared by commands that load configuration.
#[derive(clap::Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Repository root to look for `.prscore.toml` in.
    #[arg(long, default_value = ".")]
    pub path: PathBuf,

    /// Extra config file, applied over global and repo-local config.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Use the built-in demo dataset and the mock generator.
    #[arg(long, default_value_t = false)]
    pub demo: bool,
}

impl ConfigArgs {
    /// Overrides implied by the flags, applied last.
    pub fn overrides(&self) -> ConfigPatch {
        if !self.demo {
            return ConfigPatch::default();
        }
        ConfigPatch {
            llm: Some(LlmPatch {
                mode: Some(LlmMode::Mock),
                ..LlmPatch::default()
            }),
            ..ConfigPatch::default()
        }
    }
}

/// Arguments for the `review` subcommand.
#[derive(Parser, Debug)]
pub struct ReviewArgs {
    /// Pull request URL, e.g. https://github.com/acme/platform/pull/42
    pub link: String,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// Extra search keyword (repeatable), ranked ahead of text-derived ones.
    #[arg(long = "keyword", value_name = "KEYWORD")]
    pub keywords: Vec<String>,

    /// Review profile: default, security, performance or compliance.
    #[arg(long)]
    pub profile: Option<ReviewProfile>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Hide the step progress display.
    #[arg(long, default_value_t = false)]
    pub no_progress: bool,
}

impl ReviewArgs {
    /// Build the pipeline request from the flags.
    pub fn request(&self) -> ReviewRequest {
        let request = ReviewRequest::new(&self.link).with_keywords(self.keywords.iter().cloned());
        match self.profile {
            Some(profile) => request.with_profile(profile),
            None => request,
        }
    }
}

/// Arguments for the `publish` subcommand.
#[derive(Parser, Debug)]
pub struct PublishArgs {
    /// Pull request URL to comment on.
    pub link: String,

    /// File holding the (edited) comment body.
    #[arg(long)]
    pub body_file: PathBuf,

    /// Confirm the post without prompting.
    #[arg(long, short = 'y', default_value_t = false)]
    pub yes: bool,

    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Output format options.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    /// Render the outcome using the renderer for this format.
    pub fn render(&self, outcome: &ReviewOutcome) -> String {
        use prscore::output::OutputRenderer;
        match self {
            OutputFormat::Text => prscore::output::terminal::TerminalRenderer.render(outcome),
            OutputFormat::Json => prscore::output::json::JsonRenderer.render(outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    fn review(args: &[&str]) -> ReviewArgs {
        match parse(args).command {
            Command::Review(args) => *args,
            other => panic!("expected review, got {other:?}"),
        }
    }

    #[test]
    fn review_defaults() {
        let args = review(&["prscore", "review", "https://github.com/acme/platform/pull/42"]);
        assert_eq!(args.format, OutputFormat::Text);
        assert!(!args.config.demo);
        assert!(!args.no_progress);
        assert!(args.profile.is_none());
        assert_eq!(args.config.path, PathBuf::from("."));
        assert_eq!(args.config.overrides(), ConfigPatch::default());
    }

    #[test]
    fn review_request_carries_keywords_and_profile() {
        let args = review(&[
            "prscore",
            "review",
            "https://github.com/acme/platform/pull/42",
            "--keyword",
            "checkout",
            "--keyword",
            "retry",
            "--profile",
            "security",
        ]);
        let request = args.request();
        assert_eq!(request.locator, "https://github.com/acme/platform/pull/42");
        assert_eq!(request.keywords, vec!["checkout", "retry"]);
        assert_eq!(request.profile, Some(ReviewProfile::Security));
    }

    #[test]
    fn unknown_profile_is_rejected() {
        let result = Cli::try_parse_from([
            "prscore",
            "review",
            "https://github.com/acme/platform/pull/42",
            "--profile",
            "paranoid",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn demo_forces_mock_generator() {
        let args = review(&["prscore", "review", "https://github.com/a/b/pull/1", "--demo"]);
        let patch = args.config.overrides();
        assert_eq!(patch.llm.and_then(|l| l.mode), Some(LlmMode::Mock));
    }

    #[test]
    fn verbose_is_counted() {
        let cli = parse(&["prscore", "-vv", "version"]);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn json_format_parses() {
        let args = review(&["prscore", "review", "https://github.com/a/b/pull/1", "--format", "json"]);
        assert_eq!(args.format, OutputFormat::Json);
    }

    #[test]
    fn publish_requires_body_file() {
        assert!(Cli::try_parse_from(["prscore", "publish", "https://github.com/a/b/pull/1"]).is_err());
    }

    #[test]
    fn publish_flags() {
        let cli = parse(&[
            "prscore",
            "publish",
            "https://github.com/a/b/pull/1",
            "--body-file",
            "draft.md",
            "-y",
            "--demo",
        ]);
        match cli.command {
            Command::Publish(args) => {
                assert!(args.yes);
                assert!(args.config.demo);
                assert_eq!(args.body_file, PathBuf::from("draft.md"));
            }
            other => panic!("expected publish, got {other:?}"),
        }
    }
}
