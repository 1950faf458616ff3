mod adapters;
mod config;
mod core;
mod errors;
mod hosting;
mod http;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{CliOverrides, Config};
use crate::core::{PullRequestEvent, ReviewPipeline};
use crate::hosting::Platform;

#[derive(Parser)]
#[command(name = "ai-pr-review")]
#[command(about = "Reviews a pull request with LLMs and posts the findings as comments")]
#[command(long_about = None)]
#[command(version)]
struct Cli {
    /// Hosting API token used to read the diff and post comments
    #[arg(long, env = "ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    #[arg(long, env = "FULL_CONTEXT_MODEL")]
    full_context_model: Option<String>,

    #[arg(long, env = "FULL_CONTEXT_API_KEY", hide_env_values = true)]
    full_context_api_key: Option<String>,

    #[arg(long, env = "SINGLE_CHUNK_MODEL")]
    single_chunk_model: Option<String>,

    #[arg(long, env = "SINGLE_CHUNK_API_KEY", hide_env_values = true)]
    single_chunk_api_key: Option<String>,

    /// Comma-separated globs of files to skip
    #[arg(long = "exclude-files", env = "EXCLUDE")]
    exclude_files: Option<String>,

    /// Pull request event payload written by the CI runner
    #[arg(long, env = "GITHUB_EVENT_PATH")]
    event_path: PathBuf,

    #[arg(long, env = "REVIEW_PLATFORM", value_enum)]
    platform: Option<Platform>,

    #[arg(long, env = "REVIEW_MAX_CONCURRENCY")]
    max_concurrency: Option<usize>,

    /// Log what would be posted without writing to the pull request
    #[arg(long, env = "REVIEW_DRY_RUN")]
    dry_run: bool,

    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            access_token: self.access_token.clone(),
            full_context_model: self.full_context_model.clone(),
            full_context_api_key: self.full_context_api_key.clone(),
            single_chunk_model: self.single_chunk_model.clone(),
            single_chunk_api_key: self.single_chunk_api_key.clone(),
            exclude: self.exclude_files.clone(),
            platform: self.platform,
            max_concurrency: self.max_concurrency,
            dry_run: self.dry_run,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = Config::load().context("loading configuration file")?;
    config.merge_with_cli(cli.overrides());
    config.validate().context("checking inputs")?;

    let event = PullRequestEvent::load(&cli.event_path).context("reading CI event")?;
    if !event.is_reviewable() {
        info!("Unsupported event `{}`, nothing to do", event.action);
        return Ok(());
    }
    let pr = event.into_context().context("reading pull request from event")?;
    info!(
        "Reviewing pull request #{} on {:?} ({})",
        pr.number, config.platform, pr.repo_api_url
    );

    let host = hosting::create_host(
        config.platform,
        &config.access_token,
        config.request_timeout(),
    )
    .context("creating hosting client")?;
    let pipeline = ReviewPipeline::from_config(config, host).context("resolving models")?;
    pipeline.run(&pr).await.context("reviewing pull request")?;

    Ok(())
}
