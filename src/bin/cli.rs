//! sitewatch CLI
//!
//! Local execution entry point. For AWS Lambda, use `sitewatch-lambda`.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use sitewatch::{
    error::Result,
    models::{Config, StoreBackend},
    pipeline::{ChangeAggregator, CycleRunner, text},
    services::{HttpFetcher, TelegramNotifier},
    storage::{self, ResourceStore},
};

/// sitewatch - Web Page Keyword and Change Watcher
#[derive(Parser, Debug)]
#[command(
    name = "sitewatch",
    version,
    about = "Watches web pages for keywords and content changes"
)]
struct Cli {
    /// Path to storage directory (resources.json, config.toml)
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Path to config file (default: {storage_dir}/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single check cycle over every resource
    Run,

    /// Run check cycles repeatedly until interrupted
    Watch {
        /// Seconds between cycles (default: cycle.interval_secs)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Validate configuration
    Validate,

    /// Show monitored resources and their status
    Info,

    /// Print the changes between two text files
    Diff {
        /// Previous text
        old: PathBuf,
        /// Current text
        new: PathBuf,
    },
}

/// Initialize logging; `RUST_LOG` wins over the configured level.
fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn build_runner(config: &Config, store: Arc<dyn ResourceStore>) -> Result<CycleRunner> {
    let fetcher = Arc::new(HttpFetcher::new(&config.fetcher)?);
    let notifier = Arc::new(TelegramNotifier::new(&config.notifier)?);
    Ok(CycleRunner::new(fetcher, notifier, store, &config.cycle))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.storage_dir.join("config.toml"));
    let loaded = Config::load(&config_path);
    let mut config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => Config::default(),
    };

    init_logging(config.logging.default_filter(cli.verbose));
    log::info!("sitewatch starting...");

    if let Err(e) = &loaded {
        log::warn!(
            "Config load failed from {}: {}. Using defaults.",
            config_path.display(),
            e
        );
    }
    config.apply_env();
    config.store.local_dir = cli.storage_dir.clone();

    log::info!("Loaded configuration from {}", config_path.display());

    match cli.command {
        Command::Run => {
            let store: Arc<dyn ResourceStore> = Arc::from(storage::from_config(&config)?);
            let runner = build_runner(&config, store)?;
            let summary = runner.run_once().await?;

            log::info!(
                "Cycle complete: {} keywords found, {} changes detected",
                summary.keywords_found,
                summary.changes_detected
            );
        }

        Command::Watch { interval } => {
            let interval = Duration::from_secs(interval.unwrap_or(config.cycle.interval_secs));
            let store: Arc<dyn ResourceStore> = Arc::from(storage::from_config(&config)?);
            let runner = build_runner(&config, store)?;

            let shutdown = runner.shutdown_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::warn!("Interrupt received, finishing current resource...");
                    shutdown.store(true, Ordering::SeqCst);
                }
            });

            let summaries = runner.run_forever(interval).await;
            log::info!(
                "Watched {} cycles: {} keywords found, {} changes detected",
                summaries.len(),
                summaries.iter().map(|s| s.keywords_found).sum::<usize>(),
                summaries.iter().map(|s| s.changes_detected).sum::<usize>()
            );
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");

            if config.notifier.keyword_bot_token.is_none() {
                log::warn!("No keyword bot token set, keyword notifications are disabled");
            }
            if config.notifier.updates_bot_token.is_none() {
                log::warn!("No updates bot token set, change notifications are disabled");
            }

            log::info!("All validations passed!");
        }

        Command::Info => {
            match config.store.backend {
                StoreBackend::Local => {
                    log::info!("Storage directory: {}", cli.storage_dir.display())
                }
                StoreBackend::Supabase => log::info!(
                    "Supabase table: {} at {}",
                    config.store.table,
                    config.store.supabase_url.as_deref().unwrap_or("(unset)")
                ),
            }

            let store = storage::from_config(&config)?;
            let resources = store.list_active_resources().await?;
            log::info!("{} monitored resources", resources.len());

            for resource in &resources {
                let status = if resource.completed {
                    "completed"
                } else if resource.is_updated {
                    "updated"
                } else {
                    "active"
                };
                log::info!(
                    "  [{}] {} - {} pending, {} found, {} changes logged",
                    status,
                    resource.url,
                    resource.pending_keywords.len(),
                    resource.found_keywords.len(),
                    resource.update_log.len()
                );
            }
        }

        Command::Diff { old, new } => {
            let old_text = text::normalize(&std::fs::read_to_string(&old)?);
            let new_text = text::normalize(&std::fs::read_to_string(&new)?);

            let aggregator = ChangeAggregator::new(config.cycle.alignment);
            let changes = aggregator.aggregate(&old_text, &new_text, Utc::now());

            if changes.is_empty() {
                log::info!("No changes between {} and {}", old.display(), new.display());
            } else {
                println!("{}", serde_json::to_string_pretty(&changes)?);
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
