use anyhow::{Context, Result};
use background_service::{BackgroundService, DigestOutcome};
use chrono::NaiveDate;
use clap::Parser;
use llm_interface::OpenAiProvider;
use match_store::{MatchStores, SharedStores};
use notifier::EmailNotifier;
use reddit_client::RedditClient;
use std::path::PathBuf;
use std::sync::Arc;
use threadwatch_core::AppConfig;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "threadwatch=info,threadwatch_core=info,background_service=info,reddit_client=info,llm_interface=info,match_store=info,notifier=info";

#[derive(Debug, Parser)]
#[command(
    name = "threadwatch",
    version,
    about = "Watches Reddit for keyword matches, emails alerts and a daily LLM digest"
)]
struct Cli {
    /// TOML settings file (defaults to ./threadwatch.toml when present)
    #[arg(long, env = "THREADWATCH_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Run a single collect + reconcile cycle and exit
    #[arg(long, conflicts_with = "digest")]
    once: bool,

    /// Generate and send the digest for one day and exit
    #[arg(long, value_name = "YYYY-MM-DD")]
    digest: Option<NaiveDate>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_file = dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    if let Some(path) = env_file {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;

    tracing::info!(
        subreddit = %config.reddit.subreddit,
        keywords = config.monitor.keyword_matcher().len(),
        "Starting threadwatch"
    );

    let source = RedditClient::new(config.reddit.clone()).context("building Reddit client")?;
    let mailer = EmailNotifier::from_config(&config.mail).context("building SMTP mailer")?;
    let llm = OpenAiProvider::from_config(&config.llm).context("building LLM client")?;
    tracing::info!(recipient = %mailer.recipient(), "Alerts go to");

    let stores = MatchStores::new(&config.monitor.results_path, &config.monitor.tracking_path);
    tracing::info!(
        raw = %stores.raw.path().display(),
        tracking = %stores.tracking.path().display(),
        "Match stores"
    );
    let stores = SharedStores::new(stores);

    let service = BackgroundService::from_config(
        &config.monitor,
        Arc::new(source),
        Arc::new(mailer),
        Arc::new(llm),
        stores,
    );

    if let Some(date) = cli.digest {
        match service.generate_digest(date).await? {
            DigestOutcome::Sent { records } => {
                tracing::info!(%date, records, "Digest sent")
            }
            DigestOutcome::NoData => tracing::info!(%date, "No matches tracked that day"),
        }
        return Ok(());
    }

    if cli.once {
        let report = service.run_once().await;
        tracing::info!(?report, "Single cycle finished");
        return Ok(());
    }

    let shutdown = service.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Ctrl-C received, shutting down");
                shutdown.trigger();
            }
            Err(e) => tracing::warn!("Unable to listen for Ctrl-C: {}", e),
        }
    });

    service.start().await?;
    Ok(())
}
