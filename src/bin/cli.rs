//! top1000 CLI
//!
//! Runs the ingestion pipeline on a schedule or on demand, and inspects the
//! published snapshot.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use top1000::{
    error::{AppError, Result},
    models::Config,
    pipeline::{Pipeline, Scheduler, Staleness, StalenessGate},
    services::SiteDirectory,
    storage::SnapshotStore,
};

/// top1000 - IYUU top1000 feed ingestion
#[derive(Parser, Debug)]
#[command(name = "top1000", version, about = "Publishes the IYUU top1000 feed as JSON")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the snapshot directory (storage.dir)
    #[arg(long)]
    public_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh at start-up and then daily until interrupted
    Serve,

    /// Run the pipeline once, regardless of snapshot age
    Fetch {
        /// Accept a large drop in record count without waiting for it to
        /// repeat (empty feeds are still refused)
        #[arg(long)]
        force: bool,
    },

    /// Print the snapshot, refreshing it first if stale
    Show {
        /// Include details/download links from the site table
        #[arg(long)]
        links: bool,

        /// Print at most this many records
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show snapshot location, age and counts
    Info,

    /// Validate configuration and the stored snapshot
    Validate,

    /// Resolve the links for one record
    Resolve {
        /// Site name as it appears in the snapshot
        site: String,
        /// Torrent id on that site
        id: String,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool, default_level: &str) {
    let level = if verbose { "debug" } else { default_level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}


/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_or_default(&cli.config);
    config.apply_env();
    if let Some(dir) = cli.public_dir {
        config.storage.dir = dir;
    }

    init_logging(cli.verbose, &config.logging.level);
    log::info!("Loaded configuration from {}", cli.config.display());

    // `validate` reports problems itself
    if !matches!(cli.command, Command::Validate) {
        config.validate()?;
    }

    let pipeline = Pipeline::from_config(&config)?;

    match cli.command {
        Command::Serve => {
            let scheduler = Scheduler::new(pipeline, &config.schedule)?;
            log::info!(
                "Serving snapshot at {} (daily refresh at {})",
                config.storage.snapshot_path().display(),
                config.schedule.daily_at
            );

            tokio::select! {
                _ = scheduler.run_forever() => {}
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    log::info!("Interrupted, shutting down");
                }
            }
        }

        Command::Fetch { force } => {
            let summary = if force {
                pipeline.run_forced().await?
            } else {
                pipeline.run().await?
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::Show { links, limit } => {
            let sites = if links {
                SiteDirectory::from_config(&config).await?
            } else {
                None
            };
            if links && sites.is_none() {
                log::warn!("Neither sites.file nor sites.sign is configured; printing without links");
            }

            let gate = StalenessGate::new(pipeline, &config.freshness)?;
            let snapshot = gate.read_fresh().await?;

            println!("# {} ({} records)", snapshot.time, snapshot.len());
            for item in snapshot.items.iter().take(limit.unwrap_or(usize::MAX)) {
                let mut line = format!(
                    "{:>4}  {:<16} {:>8}  {:>8}  {:>10}",
                    item.ordinal_id,
                    item.site_name,
                    item.site_id,
                    item.duplication_count,
                    item.file_size
                );
                if let Some(links) = sites
                    .as_ref()
                    .and_then(|s| s.resolve(&item.site_name, &item.site_id))
                {
                    line.push_str("  ");
                    line.push_str(&links.details_url);
                    if let Some(download) = links.download_url {
                        line.push_str("  ");
                        line.push_str(&download);
                    }
                }
                println!("{}", line);
            }
        }

        Command::Info => {
            let gate = StalenessGate::new(pipeline.clone(), &config.freshness)?;
            log::info!("Snapshot: {}", pipeline.store().location());

            match pipeline.store().read().await {
                Ok(snapshot) => {
                    log::info!("Feed time: {}", snapshot.time);
                    log::info!(
                        "Records: {} from {} sites",
                        snapshot.len(),
                        snapshot.site_names.len()
                    );
                }
                Err(e) => log::info!("No snapshot available: {}", e),
            }

            match gate.staleness().await {
                Staleness::Fresh { age } => {
                    log::info!("Fresh ({}h {}m old)", age.num_hours(), age.num_minutes() % 60)
                }
                Staleness::Stale { reason } => log::info!("Stale: {}", reason),
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");

            if let Some(sites) = SiteDirectory::from_config(&config).await? {
                log::info!("✓ Site table OK ({} sites)", sites.len());
            }

            match pipeline.store().read().await {
                Ok(snapshot) => {
                    snapshot.validate()?;
                    log::info!("✓ Snapshot OK ({} records)", snapshot.len());
                }
                Err(e) if e.is_store_error() => log::warn!("Snapshot not checked: {}", e),
                Err(e) => return Err(e),
            }

            log::info!("All validations passed!");
        }

        Command::Resolve { site, id } => {
            let sites = SiteDirectory::from_config(&config)
                .await?
                .ok_or_else(|| AppError::config("neither sites.file nor sites.sign is configured"))?;

            match sites.resolve(&site, &id) {
                Some(links) => println!("{}", serde_json::to_string_pretty(&links)?),
                None => {
                    return Err(AppError::validation(format!("unknown site '{}'", site)));
                }
            }
        }
    }

    Ok(())
}
