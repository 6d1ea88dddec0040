//! Submission Monitor (§4.5): drives every non-terminal submission
//! toward a terminal state. Invoked by the Task Scheduler's
//! `download_monitor` task at interval T_m (default 30s).
//!
//! Also owns the directory-scan half of the Import Pipeline's two entry
//! points (§4.6): a recursive sweep of the downloads directory for
//! loose `*.pdf`/`*.epub` files the client-driven path never saw.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};
use walkdir::WalkDir;

use crate::catalog::{LibraryStore, Submission, SubmissionState, SubmissionStore, TrackingStore};
use crate::client::{ClientError, ClientStatus, DownloadClient};
use crate::importer::{self, CoverConfig, ImportCollaborators, ImportOptions, ImportOutcome};
use crate::locator;

const ACCEPTED_EXTENSIONS: &[&str] = &["pdf", "epub"];

/// In-process counters and timestamps (§4.5: "not persisted beyond
/// process lifetime").
#[derive(Debug, Default)]
struct MonitorStats {
    total_runs: AtomicUsize,
    client_downloads_processed: AtomicUsize,
    client_downloads_failed: AtomicUsize,
    folder_files_imported: AtomicUsize,
    bad_files_detected: AtomicUsize,
    last_client_check: RwLock<Option<DateTime<Utc>>>,
    last_folder_scan: RwLock<Option<DateTime<Utc>>>,
}

/// A point-in-time view of [`MonitorStats`], returned by
/// [`Monitor::stats`].
#[derive(Debug, Clone, Default)]
pub struct MonitorStatsSnapshot {
    pub total_runs: usize,
    pub client_downloads_processed: usize,
    pub client_downloads_failed: usize,
    pub folder_files_imported: usize,
    pub bad_files_detected: usize,
    pub last_client_check: Option<DateTime<Utc>>,
    pub last_folder_scan: Option<DateTime<Utc>>,
}

/// Configuration the Monitor needs beyond its store/client
/// collaborators, mirroring the import-relevant slices of
/// `StackwatchConfig` (§6.4) without taking a dependency on the whole
/// struct.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub downloads_dir: PathBuf,
    pub organize_dir: PathBuf,
    pub covers_dir: PathBuf,
    pub search_depth: usize,
    pub cover: CoverConfig,
    pub organization_pattern: Option<String>,
    pub category_prefix: String,
    pub fuzzy_threshold: u8,
    pub duplicate_date_threshold_days: i64,
}

/// Drives submissions to completion and imports what lands (§4.5).
pub struct Monitor {
    submission_store: SubmissionStore,
    tracking_store: TrackingStore,
    library_store: LibraryStore,
    download_client: Arc<dyn DownloadClient>,
    config: MonitorConfig,
    stats: MonitorStats,
}

impl Monitor {
    #[must_use]
    pub fn new(
        submission_store: SubmissionStore,
        tracking_store: TrackingStore,
        library_store: LibraryStore,
        download_client: Arc<dyn DownloadClient>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            submission_store,
            tracking_store,
            library_store,
            download_client,
            config,
            stats: MonitorStats::default(),
        }
    }

    /// A snapshot of the in-process statistics counters.
    pub async fn stats(&self) -> MonitorStatsSnapshot {
        MonitorStatsSnapshot {
            total_runs: self.stats.total_runs.load(Ordering::Relaxed),
            client_downloads_processed: self.stats.client_downloads_processed.load(Ordering::Relaxed),
            client_downloads_failed: self.stats.client_downloads_failed.load(Ordering::Relaxed),
            folder_files_imported: self.stats.folder_files_imported.load(Ordering::Relaxed),
            bad_files_detected: self.stats.bad_files_detected.load(Ordering::Relaxed),
            last_client_check: *self.stats.last_client_check.read().await,
            last_folder_scan: *self.stats.last_folder_scan.read().await,
        }
    }

    /// Runs one full monitor pass: poll every pollable submission, then
    /// scan the downloads directory for loose files the client-driven
    /// path never reported. The return type matches the Task
    /// Scheduler's `TaskFn` signature so this can be registered
    /// directly.
    ///
    /// # Errors
    /// Never returns an error for a single submission's own failure —
    /// those are recorded on the submission row and logged, per §4.4's
    /// "one failing collaborator never aborts the batch" idiom reused
    /// here. Propagates only if the submission-list query itself fails.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> anyhow::Result<()> {
        self.stats.total_runs.fetch_add(1, Ordering::Relaxed);

        self.poll_client_submissions().await?;
        *self.stats.last_client_check.write().await = Some(now());

        self.scan_downloads_folder().await;
        *self.stats.last_folder_scan.write().await = Some(now());

        Ok(())
    }

    async fn poll_client_submissions(&self) -> anyhow::Result<()> {
        let pollable = self.submission_store.list_pollable().await?;
        for submission in pollable {
            self.poll_one(&submission).await;
        }
        Ok(())
    }

    /// §4.5 steps 2-6 for a single submission.
    async fn poll_one(&self, submission: &Submission) {
        let Some(job_id) = submission.job_id.as_deref() else { return };
        let previous_state = submission.state();

        match self.download_client.get_status(job_id).await {
            Ok(ClientStatus::Completed { file_path }) => {
                self.stats.client_downloads_processed.fetch_add(1, Ordering::Relaxed);
                if let Err(error) = self.submission_store.mark_completed(submission.id, &file_path).await {
                    warn!(submission_id = submission.id, %error, "failed to mark submission completed");
                    return;
                }
                self.complete_submission(submission.id, submission.tracking_id, &file_path).await;
            }
            Ok(ClientStatus::Downloading { .. }) => {
                if let Err(error) = self.submission_store.mark_downloading(submission.id).await {
                    warn!(submission_id = submission.id, %error, "failed to mark submission downloading");
                }
            }
            Ok(ClientStatus::Queued) => {
                if matches!(previous_state, SubmissionState::Downloading | SubmissionState::Completed) {
                    self.reconcile_lost_job(submission).await;
                } else {
                    debug!(submission_id = submission.id, "client reports queued, no state change");
                }
            }
            Ok(ClientStatus::Failed { message }) => {
                self.stats.client_downloads_failed.fetch_add(1, Ordering::Relaxed);
                match self.submission_store.mark_failed(submission.id, &message).await {
                    Ok(attempt_count) if attempt_count >= 3 => {
                        self.stats.bad_files_detected.fetch_add(1, Ordering::Relaxed);
                        error!(submission_id = submission.id, url = %submission.source_url, "bad file: 3 failed attempts");
                    }
                    Ok(_) => {}
                    Err(error) => warn!(submission_id = submission.id, %error, "failed to mark submission failed"),
                }
            }
            Err(ClientError::UnknownJob(_)) => {
                if matches!(previous_state, SubmissionState::Downloading | SubmissionState::Completed) {
                    self.reconcile_lost_job(submission).await;
                }
            }
            Err(error) => {
                warn!(submission_id = submission.id, %error, "transient error polling client status");
            }
        }
    }

    /// §4.5 step 3: the client no longer reports progress for a job we
    /// last saw downloading or completed — either because it returns an
    /// unknown-job error outright, or because it re-reports `pending`/
    /// `queued` after having auto-pruned its history (§4.5 step 2's
    /// "no change unless previous state was DOWNLOADING or COMPLETED
    /// *and* a corresponding file exists locally"). Consults
    /// `get_completed` — documented on [`DownloadClient`] as existing
    /// specifically for this reconciliation — for the job's last-known
    /// path, then resolves that hint through the File Locator in case
    /// our filesystem view of it differs from the client's.
    async fn reconcile_lost_job(&self, submission: &Submission) {
        let Ok(completed) = self.download_client.get_completed().await else { return };
        let Some(job) =
            completed.iter().find(|job| Some(job.job_id.as_str()) == submission.job_id.as_deref())
        else {
            return;
        };

        let resolved = locator::locate(Path::new(&job.file_path), &self.config.downloads_dir, self.config.search_depth)
            .unwrap_or_else(|| PathBuf::from(&job.file_path));
        let resolved_str = resolved.display().to_string();

        if let Err(error) = self.submission_store.mark_completed(submission.id, &resolved_str).await {
            warn!(submission_id = submission.id, %error, "failed to mark reconciled submission completed");
            return;
        }
        info!(submission_id = submission.id, path = %resolved_str, "reconciled lost job via client history");
        self.complete_submission(submission.id, submission.tracking_id, &resolved_str).await;
    }

    /// §4.5 steps 4-6: hand a completed submission to the Import
    /// Pipeline, then apply the client-deletion side effect.
    async fn complete_submission(&self, submission_id: i64, tracking_id: i64, file_path: &str) {
        let resolved =
            locator::locate(Path::new(file_path), &self.config.downloads_dir, self.config.search_depth)
                .unwrap_or_else(|| PathBuf::from(file_path));

        let options = self.import_options();
        let collaborators = ImportCollaborators {
            library_store: &self.library_store,
            submission_store: &self.submission_store,
            tracking_store: &self.tracking_store,
            organize_base: &self.config.organize_dir,
            covers_dir: &self.config.covers_dir,
            submission_id: Some(submission_id),
        };

        let import_succeeded = match importer::import_file(&resolved, &options, &collaborators).await {
            Ok(ImportOutcome::Imported { library_entry_id, .. }) => {
                info!(submission_id, library_entry_id, "import complete");
                true
            }
            Ok(ImportOutcome::DuplicateSkipped { existing_entry_id }) => {
                warn!(submission_id, existing_entry_id, "duplicate import skipped");
                if let Err(error) =
                    importer::clear_submission_after_import(&self.submission_store, submission_id).await
                {
                    warn!(submission_id, %error, "failed to clear duplicate submission's file_path");
                }
                false
            }
            Err(error) => {
                error!(submission_id, %error, "import failed");
                if let Err(mark_error) =
                    self.submission_store.mark_import_failed(submission_id, &error.to_string()).await
                {
                    warn!(submission_id, error = %mark_error, "failed to record import failure");
                }
                false
            }
        };

        if self.tracking_delete_from_client_on_completion(tracking_id).await {
            self.delete_submission_job(submission_id).await;
        }
        let _ = import_succeeded;
    }

    async fn tracking_delete_from_client_on_completion(&self, tracking_id: i64) -> bool {
        match self.tracking_store.get(tracking_id).await {
            Ok(Some(tracking)) => tracking.delete_from_client_on_completion,
            Ok(None) => false,
            Err(error) => {
                warn!(tracking_id, %error, "failed to load tracking record for delete-on-completion check");
                false
            }
        }
    }

    async fn delete_submission_job(&self, submission_id: i64) {
        let Ok(Some(submission)) = self.submission_store.get(submission_id).await else { return };
        let Some(job_id) = submission.job_id.as_deref() else { return };
        if let Err(error) = self.download_client.delete(job_id).await {
            warn!(submission_id, %error, "best-effort client deletion failed");
        }
    }

    /// §4.6 directory-scan entry point: recursively walk the downloads
    /// directory for `*.pdf`/`*.epub` files outside the organize tree
    /// and import each one directly, with no originating submission.
    async fn scan_downloads_folder(&self) {
        let organize_dir = self.config.organize_dir.canonicalize().unwrap_or_else(|_| self.config.organize_dir.clone());
        let mut loose_files = Vec::new();

        for entry in WalkDir::new(&self.config.downloads_dir).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() || !is_accepted_document(entry.path()) {
                continue;
            }
            let absolute = entry.path().canonicalize().unwrap_or_else(|_| entry.path().to_path_buf());
            if absolute.starts_with(&organize_dir) {
                continue;
            }
            loose_files.push(absolute);
        }

        for path in loose_files {
            self.import_loose_file(&path).await;
        }
    }

    async fn import_loose_file(&self, path: &Path) {
        let options = self.import_options();
        let collaborators = ImportCollaborators {
            library_store: &self.library_store,
            submission_store: &self.submission_store,
            tracking_store: &self.tracking_store,
            organize_base: &self.config.organize_dir,
            covers_dir: &self.config.covers_dir,
            submission_id: None,
        };

        match importer::import_file(path, &options, &collaborators).await {
            Ok(ImportOutcome::Imported { library_entry_id, .. }) => {
                self.stats.folder_files_imported.fetch_add(1, Ordering::Relaxed);
                info!(path = %path.display(), library_entry_id, "imported loose file from downloads folder");
            }
            Ok(ImportOutcome::DuplicateSkipped { existing_entry_id }) => {
                warn!(path = %path.display(), existing_entry_id, "loose file is a duplicate, left in place");
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to import loose file, will retry next scan");
            }
        }
    }

    fn import_options(&self) -> ImportOptions {
        ImportOptions {
            skip_organize: false,
            tracking_mode: None,
            cover: self.config.cover,
            organization_pattern: self.config.organization_pattern.clone(),
            category_prefix: self.config.category_prefix.clone(),
            fuzzy_threshold: self.config.fuzzy_threshold,
            duplicate_date_threshold_days: self.config.duplicate_date_threshold_days,
        }
    }
}

fn is_accepted_document(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ACCEPTED_EXTENSIONS.iter().any(|accepted| accepted.eq_ignore_ascii_case(ext)))
}

fn now() -> DateTime<Utc> {
    Utc::now()
}
