//! Import Pipeline (§4.6): takes a completed download — either handed
//! off by the Submission Monitor or found during a directory scan —
//! and installs it into the library: parse, normalize, dedup-check,
//! extract a cover, categorize, organize on disk, and catalog.
//!
//! Filesystem and cover-render work runs under
//! `tokio::task::spawn_blocking` (§9 "Async vs blocking, concretely");
//! only the catalog-store calls are genuinely async.

mod cover;
mod error;
mod organize;

pub use cover::CoverConfig;
pub use error::{ImportError, Result};

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use crate::catalog::{LibraryStore, NewTrackingRecord, SubmissionStore, TrackingStore};
use crate::parser::{self, ParsedMetadata};
use crate::title::{clean_title, matches as titles_match};
use organize::{OrganizeInput, build_target_path, resolve_collision, safe_title};

/// What to do with the file's tracking record after import, mirroring
/// spec.md §4.6 step 8's four caller-requested modes. `None` (not a
/// variant here but the `Option` wrapping this type in
/// [`ImportOptions`]) means "leave tracking untouched", which is what
/// every Submission-driven import uses, since the tracking record
/// already exists for a submission by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingMode {
    AllEditions,
    NewOnly,
    Watch,
    Untrack,
}

/// Per-call options distinguishing the Submission-driven and
/// directory-scan-driven entry points (§4.6 "Two entry points, same
/// downstream").
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Use the file in place rather than moving it to the organize tree.
    pub skip_organize: bool,
    /// Tracking side effect to apply after a successful import, if any.
    pub tracking_mode: Option<TrackingMode>,
    pub cover: CoverConfig,
    pub organization_pattern: Option<String>,
    pub category_prefix: String,
    pub fuzzy_threshold: u8,
    pub duplicate_date_threshold_days: i64,
}

/// The result of one [`import_file`] call.
#[derive(Debug, Clone)]
pub enum ImportOutcome {
    /// The file was cataloged at `library_entry_id`, stored at
    /// `final_path` (which equals the source path when
    /// `skip_organize` was set).
    Imported { library_entry_id: i64, final_path: PathBuf, cover_path: Option<PathBuf> },
    /// Rejected as a duplicate of an existing library entry (§4.6 step 3).
    DuplicateSkipped { existing_entry_id: i64 },
}

/// Collaborators the Import Pipeline needs. Grouped into one struct so
/// call sites (the Monitor, and eventually an HTTP import endpoint)
/// don't thread five separate arguments through.
pub struct ImportCollaborators<'a> {
    pub library_store: &'a LibraryStore,
    pub submission_store: &'a SubmissionStore,
    pub tracking_store: &'a TrackingStore,
    pub organize_base: &'a Path,
    pub covers_dir: &'a Path,
    /// The submission this file came from, if any. When set, its
    /// `file_path` is cleared in the *same* transaction as the
    /// `LibraryEntry` insert (§5 critical invariant) — `None` for the
    /// directory-scan entry point, which has no originating submission.
    pub submission_id: Option<i64>,
}

/// Runs the Import Pipeline for one file (§4.6).
///
/// # Errors
/// Returns [`ImportError`] for any failure in steps 1-7; per §4.6's
/// failure semantics the caller should leave the source file and
/// originating submission untouched so the next monitor pass retries.
#[instrument(skip(collaborators, options), fields(path = %path.display()))]
pub async fn import_file(
    path: &Path,
    options: &ImportOptions,
    collaborators: &ImportCollaborators<'_>,
) -> Result<ImportOutcome> {
    let parsed = tokio::task::spawn_blocking({
        let path = path.to_path_buf();
        move || parser::parse_file(&path)
    })
    .await
    .map_err(|error| ImportError::Cover(format!("parse task panicked: {error}")))??;

    let title = clean_title(&parsed.title);

    if let Some(existing) = find_library_duplicate(
        &title,
        parsed.issue_date,
        parsed.is_special_edition,
        options.fuzzy_threshold,
        options.duplicate_date_threshold_days,
        collaborators.library_store,
    )
    .await?
    {
        warn!(title = %title, existing_entry_id = existing, "duplicate import skipped");
        return Ok(ImportOutcome::DuplicateSkipped { existing_entry_id: existing });
    }

    let category = parser::categorize(&title);

    let (final_path, cover_path) = if options.skip_organize {
        let cover = extract_cover_blocking(path, collaborators.covers_dir, &title, options.cover).await?;
        (path.to_path_buf(), cover)
    } else {
        let extension = path.extension().and_then(|e| e.to_str()).map(str::to_string).ok_or_else(|| {
            ImportError::UnsupportedExtension(path.display().to_string())
        })?;

        let target = build_target_path(&OrganizeInput {
            organize_base: collaborators.organize_base,
            category_prefix: &options.category_prefix,
            category,
            title: &title,
            language: &parsed.language,
            issue_date: parsed.issue_date,
            extension: &extension,
            pattern: options.organization_pattern.as_deref(),
        });
        let target = if target.exists() { resolve_collision(&target) } else { target };

        let cover = extract_cover_blocking(path, collaborators.covers_dir, &title, options.cover).await?;
        move_file(path, &target).await?;
        (target, cover)
    };

    let extra_metadata = json!({
        "category": category,
        "special_edition": parsed.is_special_edition,
        "country": parsed.country,
    });

    let final_path_str = final_path.to_string_lossy().into_owned();
    let cover_path_str = cover_path.as_ref().map(|p| p.to_string_lossy().into_owned());

    let mut tx = collaborators.submission_store.db().pool().begin().await?;
    let library_entry_id = LibraryStore::insert_in_tx(
        &mut tx,
        None,
        &title,
        &parsed.language,
        None,
        parsed.issue_date,
        &final_path_str,
        cover_path_str.as_deref(),
        &extra_metadata,
    )
    .await?;
    if let Some(submission_id) = collaborators.submission_id {
        SubmissionStore::clear_file_path_in_tx(&mut tx, submission_id).await?;
    }
    tx.commit().await?;

    if let Some(mode) = options.tracking_mode {
        apply_tracking_mode(mode, &title, &parsed, collaborators.tracking_store).await?;
    }

    info!(title = %title, library_entry_id, "import complete");
    Ok(ImportOutcome::Imported { library_entry_id, final_path, cover_path })
}

/// Marks a now-imported submission's `file_path` cleared, in the same
/// transaction as its [`LibraryStore::insert_in_tx`] call (§5 critical
/// invariant). Exposed separately from [`import_file`] because the
/// Monitor is the only caller that has a submission id to clear — the
/// directory-scan entry point has none.
///
/// # Errors
/// Returns [`ImportError::Catalog`] if the submission row is missing.
pub async fn clear_submission_after_import(
    submission_store: &SubmissionStore,
    submission_id: i64,
) -> Result<()> {
    let mut tx = submission_store.db().pool().begin().await?;
    SubmissionStore::clear_file_path_in_tx(&mut tx, submission_id).await?;
    tx.commit().await?;
    Ok(())
}

/// §4.6 step 3: fuzzy-match against every existing entry, restricted to
/// entries with the same special-edition-ness (§6 scenario S6: "Wired"
/// and "Wired - Holiday Special" never dedup against each other).
async fn find_library_duplicate(
    title: &str,
    issue_date: NaiveDate,
    is_special_edition: bool,
    fuzzy_threshold: u8,
    duplicate_date_threshold_days: i64,
    library_store: &LibraryStore,
) -> Result<Option<i64>> {
    for entry in library_store.list_all().await? {
        let entry_is_special = entry
            .extra_metadata()
            .ok()
            .and_then(|metadata| metadata.get("special_edition").and_then(Value::as_bool))
            .unwrap_or(false);
        if entry_is_special != is_special_edition {
            continue;
        }

        if !titles_match(title, &entry.title, fuzzy_threshold) {
            continue;
        }

        let day_gap = (issue_date - entry.issue_date()).num_days().abs();
        if day_gap <= duplicate_date_threshold_days {
            return Ok(Some(entry.id));
        }
    }
    Ok(None)
}

async fn extract_cover_blocking(
    source: &Path,
    covers_dir: &Path,
    title: &str,
    config: CoverConfig,
) -> Result<Option<PathBuf>> {
    regenerate_cover(source, covers_dir, title, config).await
}

/// Runs [`cover::extract_cover`] on a blocking thread. Public so Cover
/// Cleanup can re-extract a cover for a library entry whose cover file
/// went missing, reusing the exact extraction logic the Import
/// Pipeline itself uses rather than a second copy of it.
///
/// # Errors
/// Returns [`ImportError::Cover`] or [`ImportError::Io`] as
/// [`cover::extract_cover`] does.
pub async fn regenerate_cover(
    source: &Path,
    covers_dir: &Path,
    title: &str,
    config: CoverConfig,
) -> Result<Option<PathBuf>> {
    let source = source.to_path_buf();
    let covers_dir = covers_dir.to_path_buf();
    let stem = safe_title(title);
    tokio::task::spawn_blocking(move || cover::extract_cover(&source, &covers_dir, &stem, config))
        .await
        .map_err(|error| ImportError::Cover(format!("cover extraction task panicked: {error}")))?
}

async fn move_file(source: &Path, target: &Path) -> Result<()> {
    let source = source.to_path_buf();
    let target = target.to_path_buf();
    tokio::task::spawn_blocking(move || {
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if std::fs::rename(&source, &target).is_err() {
            std::fs::copy(&source, &target)?;
            std::fs::remove_file(&source)?;
        }
        Ok::<(), std::io::Error>(())
    })
    .await
    .map_err(|error| ImportError::Cover(format!("move task panicked: {error}")))??;
    Ok(())
}

/// §4.6 step 8, tracking side effect. `olid` is derived from the
/// cleaned title the same way the rest of the crate treats it: an
/// opaque slug, not a real external identifier (§GLOSSARY "OLID").
async fn apply_tracking_mode(
    mode: TrackingMode,
    title: &str,
    parsed: &ParsedMetadata,
    tracking_store: &TrackingStore,
) -> Result<()> {
    let olid = derive_olid(title);

    if mode == TrackingMode::Untrack {
        tracking_store.delete_by_olid(&olid).await?;
        return Ok(());
    }

    let (track_all, track_new) = match mode {
        TrackingMode::AllEditions => (true, false),
        TrackingMode::NewOnly => (false, true),
        TrackingMode::Watch => (false, false),
        TrackingMode::Untrack => unreachable!("handled above"),
    };

    tracking_store
        .upsert(&NewTrackingRecord {
            olid: &olid,
            title,
            publisher: None,
            issn: None,
            first_publish_year: None,
            language: &parsed.language,
            category: parser::categorize(title),
            track_all_editions: track_all,
            track_new_only: track_new,
            selected_editions: &HashMap::new(),
            selected_years: &HashSet::new(),
            delete_from_client_on_completion: false,
            metadata: &Value::Null,
        })
        .await?;
    Ok(())
}

fn derive_olid(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_was_dash = false;
    for ch in title.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
            last_was_dash = false;
        } else if !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }
    slug.trim_matches('-').to_string()
}
