//! Watcher CLI
//!
//! Local execution entry point, typically invoked by an external scheduler.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use watcher::{
    error::Result,
    feed::FeedBuilder,
    models::{Config, SiteConfig, WatcherConfig, default_base_url, validate_feed_name},
    pipeline::{Watcher, run_batch},
    storage::{LocalStorage, VersionStore},
};

/// Watcher - website change tracker with RSS output
#[derive(Parser, Debug)]
#[command(name = "watcher", version, about = "Track web pages and publish changes as RSS")]
struct Cli {
    /// Storage root holding content/ and feeds/
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check every site listed in the configuration file
    Batch {
        /// Sites configuration (TOML)
        #[arg(short, long, default_value = "sites.toml")]
        config: PathBuf,

        /// Public base URL for feed links (overrides the config file)
        #[arg(long)]
        base_url: Option<String>,

        /// owner/repo used for the fallback base URL
        #[arg(long, env = "GITHUB_REPOSITORY")]
        repository: Option<String>,

        /// Write the batch summary as JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Check a single page
    Check {
        /// Page URL
        url: String,

        /// Feed name (names the content directory and feed document)
        feed_name: String,

        /// Minimum hours between checks
        #[arg(long)]
        min_hours: Option<f64>,

        /// Public base URL for feed links
        #[arg(long)]
        base_url: Option<String>,

        /// owner/repo used for the fallback base URL
        #[arg(long, env = "GITHUB_REPOSITORY")]
        repository: Option<String>,

        /// Optional configuration file for watcher settings
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Validate the configuration file
    Validate {
        #[arg(short, long, default_value = "sites.toml")]
        config: PathBuf,
    },

    /// Show stored state for one feed
    Info {
        feed_name: String,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
    watcher::utils::log::init(verbose);
}

fn base_url_for(
    settings: &WatcherConfig,
    explicit: Option<String>,
    repository: Option<&str>,
) -> String {
    match explicit.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
        _ => settings.resolve_base_url(repository),
    }
}

fn load_settings(path: Option<&Path>) -> Result<WatcherConfig> {
    let Some(path) = path else {
        return Ok(WatcherConfig::default());
    };
    let config = Config::load(path)?;
    config.watcher.validate()?;
    Ok(config.watcher)
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Batch {
            config,
            base_url,
            repository,
            report,
        } => {
            let config_file = Config::load(&config)?;
            config_file.watcher.validate()?;
            log::info!(
                "Loaded {} site(s) from {}",
                config_file.sites.len(),
                config.display()
            );

            let base_url = base_url_for(&config_file.watcher, base_url, repository.as_deref());
            let watcher = Watcher::from_config(&config_file.watcher, &cli.root, base_url)?;
            let summary =
                run_batch(&watcher, &config_file.sites, config_file.watcher.max_concurrent).await;

            if let Some(report) = report {
                let json = serde_json::to_string_pretty(&summary)?;
                std::fs::write(&report, json)?;
                log::info!("Report saved to {}", report.display());
            }

            Ok(ExitCode::from(summary.exit_code()))
        }

        Command::Check {
            url,
            feed_name,
            min_hours,
            base_url,
            repository,
            config,
        } => {
            let settings = load_settings(config.as_deref())?;
            let base_url = base_url_for(&settings, base_url, repository.as_deref());
            let watcher = Watcher::from_config(&settings, &cli.root, base_url)?;

            let site = SiteConfig {
                url,
                feed_name,
                min_hours,
            };
            let result = watcher.run(&site).await;
            println!("{}", serde_json::to_string_pretty(&result)?);

            Ok(if result.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Command::Validate { config } => {
            log::info!("Validating {}...", config.display());

            let config = Config::load(&config)?;
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK ({} site(s))", config.sites.len());
            Ok(ExitCode::SUCCESS)
        }

        Command::Info { feed_name } => {
            validate_feed_name(&feed_name)?;

            let storage = LocalStorage::new(&cli.root);
            let versions = VersionStore::new(storage.clone());
            let feeds = FeedBuilder::new(storage, default_base_url(None));

            let meta = versions.metadata(&feed_name).await;
            let snapshots = versions.snapshots(&feed_name).await?;

            log::info!("Storage root: {}", cli.root.display());
            log::info!("Feed: {}", FeedBuilder::feed_key(&feed_name));
            log::info!(
                "Last hash: {}",
                meta.last_hash.as_deref().unwrap_or("none")
            );
            log::info!(
                "Last check: {}",
                meta.last_update.as_deref().unwrap_or("never")
            );
            log::info!(
                "Latest snapshot: {}",
                snapshots.last().map(String::as_str).unwrap_or("none")
            );
            log::info!("Snapshots stored: {}", snapshots.len());
            log::info!("Feed entries: {}", feeds.load(&feed_name).await.len());
            Ok(ExitCode::SUCCESS)
        }
    }
}
