//! prscore: context-aware pull request scoring.
//!
//! Entry point and error handling boundary. Uses `anyhow` for
//! ergonomic error propagation and user-facing messages.

mod cli;

use prscore::config;
use prscore::constants;
use prscore::env;
use prscore::llm;
use prscore::models;
use prscore::orchestrator;
use prscore::progress;
use prscore::providers;

use std::io::{BufRead, IsTerminal, Write};
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;

use cli::args::{Cli, Command, ConfigArgs, PublishArgs, ReviewArgs};
use config::{Config, merge_config};
use env::Env;
use models::context::PublishRequest;
use orchestrator::{PIPELINE_STEPS, ReviewOrchestrator};
use progress::ProgressObserver;
use providers::ProviderSet;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Review(args) => run_review(*args).await,
        Command::Publish(args) => run_publish(args).await,
        Command::Version => run_version(),
    }
}

/// Install the stderr log subscriber. `PRSCORE_LOG` overrides the verbosity flag.
fn init_tracing(verbose: u8) {
    use tracing_subscriber::{EnvFilter, fmt};

    let default = match verbose {
        0 => "warn",
        1 => "prscore=debug",
        _ => "prscore=trace",
    };
    let filter =
        EnvFilter::try_from_env(constants::ENV_LOG).unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Print detailed version and build information.
fn run_version() -> Result<()> {
    use colored::Colorize;

    println!(
        "{} {}",
        constants::APP_NAME.bold(),
        constants::VERSION.green().bold()
    );
    println!("{}     {}", "target:".dimmed(), constants::TARGET);
    Ok(())
}

/// Resolve configuration and build the providers it selects.
fn load_backends(args: &ConfigArgs, env: &Env) -> Result<(Config, ProviderSet)> {
    let config = Config::load(Some(args.path.as_path()), args.config.as_deref(), env)
        .context("failed to load configuration")?;
    let config = merge_config(&config, &args.overrides());

    let providers =
        ProviderSet::from_config(&config, args.demo).context("failed to set up providers")?;
    Ok((config, providers))
}

/// Providers plus the generator `llm.mode` selects.
fn build_orchestrator(args: &ConfigArgs, env: &Env) -> Result<ReviewOrchestrator> {
    let (config, providers) = load_backends(args, env)?;
    let generator = llm::from_config(&config.llm).context("failed to set up the LLM backend")?;
    tracing::debug!(generator = %generator.describe(), demo = args.demo, "backends ready");

    Ok(ReviewOrchestrator::new(providers, generator).with_config(config))
}

/// Run the full review pipeline and print the result.
async fn run_review(args: ReviewArgs) -> Result<()> {
    let env = Env::real();
    let show_progress = !args.no_progress && std::io::stderr().is_terminal();
    let progress = Arc::new(ProgressObserver::new(&PIPELINE_STEPS, show_progress));

    let orchestrator = build_orchestrator(&args.config, &env)?.with_observer(progress);
    let outcome = orchestrator
        .run(&args.request())
        .await
        .with_context(|| format!("review of {} failed", args.link))?;

    print!("{}", args.format.render(&outcome));
    Ok(())
}

/// Post an edited comment through the publish gate.
async fn run_publish(args: PublishArgs) -> Result<()> {
    use colored::Colorize;

    let env = Env::real();
    let body = tokio::fs::read_to_string(&args.body_file)
        .await
        .with_context(|| format!("failed to read {}", args.body_file.display()))?;

    let (config, providers) = load_backends(&args.config, &env)?;
    let orchestrator = ReviewOrchestrator::publisher(providers).with_config(config);
    let confirmed = args.yes
        || (orchestrator.config().post.require_confirmation && confirm(&args.link)?);

    let result = orchestrator
        .publish_edited_comment(&PublishRequest {
            locator: args.link.clone(),
            body,
            confirmed,
        })
        .await
        .with_context(|| format!("failed to publish to {}", args.link))?;

    println!(
        "  {} Comment posted: {}",
        "✔".green().bold(),
        result.comment.url.bold()
    );
    Ok(())
}

/// Ask on the terminal before posting. Non-interactive sessions never confirm.
fn confirm(link: &str) -> Result<bool> {
    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        return Ok(false);
    }

    eprint!("Post this comment to {link}? [y/N] ");
    std::io::stderr().flush()?;

    let mut answer = String::new();
    stdin
        .lock()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => Ok(true),
        "" | "n" | "no" => Ok(false),
        other => bail!("unrecognized answer '{other}'"),
    }
}
