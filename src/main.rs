//! Composition root for the `stackwatch` binary: wires config, the
//! catalog stores, the search/download-client collaborators, and the
//! Task Scheduler together, then dispatches to either the long-running
//! daemon (`run`) or one of the one-shot CLI commands.

mod cli;
mod commands;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use stackwatch_core::catalog::{LibraryStore, SearchResultStore, SubmissionStore, TrackingStore};
use stackwatch_core::client::{DownloadClient, SabnzbdClient};
use stackwatch_core::config::StackwatchConfig;
use stackwatch_core::credentials::CredentialStore;
use stackwatch_core::importer::CoverConfig;
use stackwatch_core::monitor::{Monitor, MonitorConfig};
use stackwatch_core::scheduler::Scheduler;
use stackwatch_core::search::{RssSearchProvider, SearchRegistry};
use stackwatch_core::{catalog, db::Database, orchestrator};
use tracing_subscriber::EnvFilter;

use cli::{Args, AuthCommand, Command, LibraryCommand, TrackCommand};

/// The locator's filesystem search depth below the downloads directory
/// (§4.6 "File Locator"); not itself config-surfaced by §6.4.
const LOCATOR_SEARCH_DEPTH: usize = 3;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose, args.quiet);

    let config_path = args.config.clone().unwrap_or_else(StackwatchConfig::default_path);
    let config = StackwatchConfig::load(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let db = Database::new(&config.storage.db_path)
        .await
        .with_context(|| format!("opening database at {}", config.storage.db_path.display()))?;
    catalog::evolve_schema(db.pool()).await.context("evolving catalog schema")?;

    let tracking_store = TrackingStore::new(db.clone());
    let submission_store = SubmissionStore::new(db.clone());
    let search_result_store = SearchResultStore::new(db.clone());
    let library_store = LibraryStore::new(db.clone());
    let credential_store = CredentialStore::new(db.pool().clone());

    match args.command {
        Command::Run => run_daemon(&config, tracking_store, submission_store, search_result_store, library_store).await,

        Command::Track { command } => match command {
            TrackCommand::Add(add_args) => commands::run_track_add(&tracking_store, &add_args).await,
            TrackCommand::List => commands::run_track_list(&tracking_store).await,
            TrackCommand::Remove { olid } => commands::run_track_remove(&tracking_store, &olid).await,
        },

        Command::Library { command } => match command {
            LibraryCommand::List => commands::run_library_list(&library_store).await,
        },

        Command::Import(import_args) => {
            commands::run_import(&import_args, &config, &library_store, &submission_store, &tracking_store).await
        }

        Command::Auth { command } => match command {
            AuthCommand::SetPassword { username } => {
                commands::run_auth_set_password(&credential_store, &username).await
            }
        },

        Command::Config => commands::run_config_show(&config),
    }
}

/// Configures the global tracing subscriber. `-v`/`-vv` raise the
/// default level past the crate's own `info`; `-q` suppresses
/// everything but warnings and errors.
fn init_tracing(verbose: u8, quiet: bool) {
    let default_level = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Builds the Search Registry from `[[providers.rss]]` config entries.
/// A provider whose feed URL is malformed is skipped with a warning
/// rather than failing startup, matching the Orchestrator's own
/// "one bad collaborator never blocks the rest" idiom.
fn build_search_registry(config: &StackwatchConfig) -> SearchRegistry {
    let mut registry = SearchRegistry::new();
    for provider in &config.providers.rss {
        match RssSearchProvider::new(provider.name.clone(), provider.feed_url.clone()) {
            Ok(provider) => registry.register(Box::new(provider)),
            Err(error) => {
                tracing::warn!(provider = %provider.name, %error, "skipping misconfigured RSS provider");
            }
        }
    }
    registry
}

/// Builds the configured download client. Exactly one client backend
/// is supported today (SABnzbd); a missing `[client.sabnzbd]` table is
/// a startup error since the daemon has nothing to poll without one.
fn build_download_client(config: &StackwatchConfig) -> Result<Arc<dyn DownloadClient>> {
    let Some(sabnzbd) = &config.client.sabnzbd else {
        bail!("no download client configured; add a [client.sabnzbd] table");
    };
    let client = SabnzbdClient::new(sabnzbd.name.clone(), sabnzbd.api_url.clone(), sabnzbd.api_key.clone())
        .context("constructing SABnzbd client")?;
    Ok(Arc::new(client))
}

/// Runs the scheduler loop until interrupted: the Submission Monitor,
/// the auto-download sweep, and Cover Cleanup, each on its own
/// configured interval (§4.8).
async fn run_daemon(
    config: &StackwatchConfig,
    tracking_store: TrackingStore,
    submission_store: SubmissionStore,
    search_result_store: SearchResultStore,
    library_store: LibraryStore,
) -> Result<()> {
    let search_registry = Arc::new(build_search_registry(config));
    let download_client = build_download_client(config)?;
    let covers_dir = config.storage.organize_dir.join(".covers");

    let monitor_config = MonitorConfig {
        downloads_dir: config.storage.download_dir.clone(),
        organize_dir: config.storage.organize_dir.clone(),
        covers_dir: covers_dir.clone(),
        search_depth: LOCATOR_SEARCH_DEPTH,
        cover: CoverConfig { dpi: config.pdf.cover_dpi_low, quality: config.pdf.cover_quality_low },
        organization_pattern: config.import.organization_pattern.clone(),
        category_prefix: config.import.category_prefix.clone(),
        fuzzy_threshold: config.matching.fuzzy_threshold,
        duplicate_date_threshold_days: config.matching.duplicate_date_threshold_days,
    };
    let monitor = Arc::new(Monitor::new(
        submission_store.clone(),
        tracking_store.clone(),
        library_store.clone(),
        Arc::clone(&download_client),
        monitor_config,
    ));

    let scheduler = Scheduler::new();

    let monitor_for_task = Arc::clone(&monitor);
    scheduler
        .register(
            "download_monitor",
            Duration::from_secs(config.tasks.download_monitor_interval),
            Box::new(move || {
                let monitor = Arc::clone(&monitor_for_task);
                Box::pin(async move { monitor.run_once().await })
            }),
        )
        .await;

    let max_per_batch = config.downloads.max_per_batch;
    scheduler
        .register(
            "auto_download",
            Duration::from_secs(config.tasks.auto_download_interval),
            Box::new(move || {
                let tracking_store = tracking_store.clone();
                let submission_store = submission_store.clone();
                let search_result_store = search_result_store.clone();
                let search_registry = Arc::clone(&search_registry);
                let download_client = Arc::clone(&download_client);
                Box::pin(async move {
                    run_auto_download(
                        &tracking_store,
                        &search_registry,
                        &submission_store,
                        &search_result_store,
                        download_client.as_ref(),
                        max_per_batch,
                    )
                    .await
                })
            }),
        )
        .await;

    let cover_config = CoverConfig { dpi: config.pdf.cover_dpi_low, quality: config.pdf.cover_quality_low };
    scheduler
        .register(
            "cleanup_orphaned_covers",
            Duration::from_secs(config.tasks.cleanup_covers_interval),
            Box::new(move || {
                let library_store = library_store.clone();
                let covers_dir = covers_dir.clone();
                Box::pin(async move {
                    stackwatch_core::cleanup::run_once(&library_store, &covers_dir, cover_config)
                        .await
                        .map(|_| ())
                })
            }),
        )
        .await;

    tracing::info!("scheduler starting; press ctrl-c to stop");
    tokio::select! {
        () = scheduler.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c; stopping scheduler");
            scheduler.stop();
        }
    }

    Ok(())
}

/// Runs the Download Orchestrator for every active tracking record
/// (§4.4), the daemon's `auto_download` task body. One record's
/// failure is logged and skipped, matching the Orchestrator's own
/// per-provider "never abort the batch" idiom.
async fn run_auto_download(
    tracking_store: &TrackingStore,
    search_registry: &SearchRegistry,
    submission_store: &SubmissionStore,
    search_result_store: &SearchResultStore,
    download_client: &dyn DownloadClient,
    max_per_batch: usize,
) -> Result<()> {
    let records = tracking_store.list_active().await.context("listing active tracking records")?;
    for record in &records {
        match orchestrator::run(
            record.id,
            tracking_store,
            search_registry,
            submission_store,
            search_result_store,
            download_client,
            max_per_batch,
        )
        .await
        {
            Ok(outcome) => {
                tracing::info!(
                    tracking_id = record.id,
                    submitted = outcome.submitted,
                    skipped = outcome.skipped,
                    failed = outcome.failed,
                    "orchestrator run complete"
                );
            }
            Err(error) => {
                tracing::warn!(tracking_id = record.id, %error, "orchestrator run failed; continuing with remaining records");
            }
        }
    }
    Ok(())
}
