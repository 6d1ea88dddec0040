//! Cover Cleanup (§2 "Cover Cleanup" row, §4.8 `cleanup_orphaned_covers`
//! task): reconciles the `.covers` directory against the catalog's
//! `cover_path` references — delete files nothing points to, and
//! regenerate a library entry's cover when its referenced file (or the
//! lack of one) no longer matches reality.
//!
//! Registered on the Task Scheduler at `tasks.cleanup_covers_interval`
//! (default 86400s / once a day), since it is an O(covers on disk +
//! library entries) sweep, not something that needs to run per-import.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use crate::catalog::LibraryStore;
use crate::importer::{self, CoverConfig};

/// Result of one cleanup pass, for logging and the scheduler's task
/// status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupOutcome {
    pub orphans_deleted: usize,
    pub covers_regenerated: usize,
    pub regeneration_failures: usize,
}

/// Runs one Cover Cleanup pass.
///
/// # Errors
/// Returns an error only if the library entries themselves cannot be
/// listed or the covers directory cannot be read — a single entry's
/// regeneration failure is counted in the returned outcome and logged,
/// never propagated (matches the Monitor's "one failure never aborts
/// the pass" idiom).
#[instrument(skip(library_store))]
pub async fn run_once(
    library_store: &LibraryStore,
    covers_dir: &Path,
    cover_config: CoverConfig,
) -> anyhow::Result<CleanupOutcome> {
    let entries = library_store.list_all().await?;
    let referenced: HashSet<PathBuf> =
        entries.iter().filter_map(|entry| entry.cover_path.as_ref()).map(PathBuf::from).collect();

    let orphans_deleted = delete_orphaned_covers(covers_dir, &referenced)?;

    let mut covers_regenerated = 0;
    let mut regeneration_failures = 0;

    for entry in &entries {
        let needs_regeneration = match entry.cover_path.as_deref() {
            None => true,
            Some(path) => !Path::new(path).is_file(),
        };
        if !needs_regeneration {
            continue;
        }

        let source = Path::new(&entry.file_path);
        if !source.is_file() {
            // Nothing to extract from; leave cover_path as-is for a
            // future pass once the source file reappears.
            continue;
        }

        match importer::regenerate_cover(source, covers_dir, &entry.title, cover_config).await {
            Ok(Some(cover_path)) => {
                let cover_path_str = cover_path.to_string_lossy().into_owned();
                if let Err(error) = library_store.update_cover_path(entry.id, &cover_path_str).await {
                    warn!(entry_id = entry.id, %error, "regenerated cover but failed to record it");
                    regeneration_failures += 1;
                } else {
                    covers_regenerated += 1;
                }
            }
            Ok(None) => {
                // No extractable cover for this file type; not a failure.
            }
            Err(error) => {
                warn!(entry_id = entry.id, %error, "cover regeneration failed");
                regeneration_failures += 1;
            }
        }
    }

    let outcome = CleanupOutcome { orphans_deleted, covers_regenerated, regeneration_failures };
    info!(?outcome, "cover cleanup pass complete");
    Ok(outcome)
}

fn delete_orphaned_covers(covers_dir: &Path, referenced: &HashSet<PathBuf>) -> anyhow::Result<usize> {
    if !covers_dir.is_dir() {
        return Ok(0);
    }

    let mut deleted = 0;
    for entry in std::fs::read_dir(covers_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() || referenced.contains(&path) {
            continue;
        }
        std::fs::remove_file(&path)?;
        deleted += 1;
        info!(path = %path.display(), "deleted orphaned cover image");
    }
    Ok(deleted)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::NaiveDate;
    use serde_json::json;

    async fn seeded_store(covers_dir: &Path) -> LibraryStore {
        std::fs::create_dir_all(covers_dir).unwrap();
        let db = Database::new_in_memory().await.unwrap();
        LibraryStore::new(db)
    }

    #[tokio::test]
    async fn test_deletes_orphaned_cover_with_no_referencing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let covers_dir = dir.path().join(".covers");
        let store = seeded_store(&covers_dir).await;

        let orphan = covers_dir.join("nobody-references-me.jpg");
        std::fs::write(&orphan, b"jpeg bytes").unwrap();

        let outcome =
            run_once(&store, &covers_dir, CoverConfig { dpi: 100, quality: 80 }).await.unwrap();

        assert_eq!(outcome.orphans_deleted, 1);
        assert!(!orphan.exists());
    }

    #[tokio::test]
    async fn test_keeps_referenced_cover() {
        let dir = tempfile::tempdir().unwrap();
        let covers_dir = dir.path().join(".covers");
        let store = seeded_store(&covers_dir).await;

        let source = dir.path().join("Wired - Dec2023.pdf");
        std::fs::write(&source, b"not really a pdf").unwrap();
        let cover = covers_dir.join("wired.jpg");
        std::fs::write(&cover, b"jpeg bytes").unwrap();

        let mut tx = store.db().pool().begin().await.unwrap();
        LibraryStore::insert_in_tx(
            &mut tx,
            None,
            "Wired",
            "English",
            None,
            NaiveDate::from_ymd_opt(2023, 12, 1).unwrap(),
            &source.display().to_string(),
            Some(&cover.display().to_string()),
            &json!({}),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let outcome =
            run_once(&store, &covers_dir, CoverConfig { dpi: 100, quality: 80 }).await.unwrap();

        assert_eq!(outcome.orphans_deleted, 0);
        assert!(cover.exists());
    }

    #[tokio::test]
    async fn test_skips_regeneration_when_source_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let covers_dir = dir.path().join(".covers");
        let store = seeded_store(&covers_dir).await;

        let mut tx = store.db().pool().begin().await.unwrap();
        LibraryStore::insert_in_tx(
            &mut tx,
            None,
            "Wired",
            "English",
            None,
            NaiveDate::from_ymd_opt(2023, 12, 1).unwrap(),
            "/nonexistent/wired.pdf",
            None,
            &json!({}),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let outcome =
            run_once(&store, &covers_dir, CoverConfig { dpi: 100, quality: 80 }).await.unwrap();

        assert_eq!(outcome.covers_regenerated, 0);
        assert_eq!(outcome.regeneration_failures, 0);
    }
}
