//! `Submission`: one attempt to acquire a specific issue, and its state
//! machine (§3.1, §4.10).

use std::collections::HashSet;
use std::fmt;

use sqlx::FromRow;
use tracing::instrument;

use super::error::{CatalogError, Result, check_affected};
use crate::db::Database;

/// Submission lifecycle states.
///
/// `ImportFailed` is additive beyond spec.md's five states, per the
/// Design Notes (§9) recommendation: a submission whose import fails
/// after reaching `Completed` moves here instead of back to `Failed`,
/// preserving both the completion fact and the downloaded `file_path`
/// for a future import retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum SubmissionState {
    Pending,
    Downloading,
    Completed,
    Failed,
    Skipped,
    #[sqlx(rename = "import_failed")]
    ImportFailed,
}

impl SubmissionState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::ImportFailed => "import_failed",
        }
    }

    /// Terminal states are never left except for the import-completion
    /// `file_path` clear on `Completed` (§8.1 invariant).
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::Downloading)
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SubmissionState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "downloading" => Ok(Self::Downloading),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            "import_failed" => Ok(Self::ImportFailed),
            other => Err(format!("invalid submission state: {other}")),
        }
    }
}

/// A single attempt to acquire a specific issue (§3.1).
#[derive(Debug, Clone, FromRow)]
pub struct Submission {
    pub id: i64,
    pub tracking_id: i64,
    pub search_result_id: Option<i64>,
    #[sqlx(rename = "status")]
    pub status_str: String,
    pub job_id: Option<String>,
    pub source_url: String,
    pub result_title: String,
    pub fuzzy_match_group: Option<String>,
    pub client_name: Option<String>,
    pub attempt_count: i64,
    pub last_error: Option<String>,
    pub file_path: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Submission {
    /// Parses the stored status string. Defaults to `Pending` for a row
    /// with a status value that pre-dates a later enum variant, the same
    /// fallback convention the reference crate's `QueueItem::status()`
    /// uses.
    #[must_use]
    pub fn state(&self) -> SubmissionState {
        self.status_str.parse().unwrap_or(SubmissionState::Pending)
    }
}

/// Typed persistence for [`Submission`] rows.
#[derive(Debug, Clone)]
pub struct SubmissionStore {
    db: Database,
}

impl SubmissionStore {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Creates a submission in the given state. `job_id` is null for
    /// `Skipped` and rejected (`Failed` with no job) submissions.
    ///
    /// # Errors
    /// Returns [`CatalogError::Database`] on query failure.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self), fields(tracking_id, state = %state))]
    pub async fn create(
        &self,
        tracking_id: i64,
        search_result_id: Option<i64>,
        state: SubmissionState,
        job_id: Option<&str>,
        source_url: &str,
        result_title: &str,
        fuzzy_match_group: Option<&str>,
        client_name: Option<&str>,
        last_error: Option<&str>,
    ) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r"INSERT INTO download_submissions (
                tracking_id, search_result_id, status, job_id, source_url, result_title,
                fuzzy_match_group, client_name, attempt_count, last_error
              ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?)
              RETURNING id",
        )
        .bind(tracking_id)
        .bind(search_result_id)
        .bind(state.as_str())
        .bind(job_id)
        .bind(source_url)
        .bind(result_title)
        .bind(fuzzy_match_group)
        .bind(client_name)
        .bind(last_error)
        .fetch_one(self.db.pool())
        .await?;

        Ok(row.0)
    }

    /// Fetches a submission by id.
    ///
    /// # Errors
    /// Returns [`CatalogError::Database`] on query failure.
    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<Option<Submission>> {
        let row = sqlx::query_as::<_, Submission>("SELECT * FROM download_submissions WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row)
    }

    /// Lists every non-terminal submission with a non-null `job_id`
    /// (§4.5 step 1: what the Monitor polls each run).
    ///
    /// # Errors
    /// Returns [`CatalogError::Database`] on query failure.
    #[instrument(skip(self))]
    pub async fn list_pollable(&self) -> Result<Vec<Submission>> {
        let rows = sqlx::query_as::<_, Submission>(
            r"SELECT * FROM download_submissions
              WHERE status IN ('pending', 'downloading') AND job_id IS NOT NULL
              ORDER BY id ASC",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }

    /// Returns the set of `fuzzy_match_group` keys for this tracking
    /// record currently blocking dedup: state in
    /// `{pending, downloading, completed}` (§4.4 step 4, already-submitted
    /// filter).
    ///
    /// # Errors
    /// Returns [`CatalogError::Database`] on query failure.
    #[instrument(skip(self))]
    pub async fn active_group_keys(&self, tracking_id: i64) -> Result<HashSet<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r"SELECT DISTINCT fuzzy_match_group FROM download_submissions
              WHERE tracking_id = ?
                AND status IN ('pending', 'downloading', 'completed')
                AND fuzzy_match_group IS NOT NULL",
        )
        .bind(tracking_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows.into_iter().map(|(key,)| key).collect())
    }

    /// Returns the set of `source_url`s blacklisted as "bad files":
    /// `attempt_count >= 3` and `state = Failed`, across *any* tracking
    /// record (§4.4 step 4 bad-file filter; §GLOSSARY "Bad file").
    ///
    /// # Errors
    /// Returns [`CatalogError::Database`] on query failure.
    #[instrument(skip(self))]
    pub async fn bad_file_urls(&self) -> Result<HashSet<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r"SELECT DISTINCT source_url FROM download_submissions
              WHERE status = 'failed' AND attempt_count >= 3",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows.into_iter().map(|(url,)| url).collect())
    }

    /// Returns the creation timestamp of the most recent submission for
    /// this tracking record, used for the `mode_new_only` filter's
    /// newest-existing-submission semantics (§9 Open Question,
    /// resolved).
    ///
    /// # Errors
    /// Returns [`CatalogError::Database`] on query failure.
    #[instrument(skip(self))]
    pub async fn newest_submission_created_at(&self, tracking_id: i64) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            r"SELECT created_at FROM download_submissions
              WHERE tracking_id = ?
              ORDER BY created_at DESC, id DESC
              LIMIT 1",
        )
        .bind(tracking_id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(row.map(|(created_at,)| created_at))
    }

    /// Transitions a submission to `Downloading`.
    ///
    /// # Errors
    /// Returns [`CatalogError::NotFound`] if no row matched.
    #[instrument(skip(self))]
    pub async fn mark_downloading(&self, id: i64) -> Result<()> {
        let result = sqlx::query(
            r"UPDATE download_submissions SET status = 'downloading', updated_at = datetime('now')
              WHERE id = ?",
        )
        .bind(id)
        .execute(self.db.pool())
        .await?;
        check_affected(id, result.rows_affected())
    }

    /// Transitions a submission to `Completed` with the client-reported
    /// file path (§4.5 step 2).
    ///
    /// # Errors
    /// Returns [`CatalogError::NotFound`] if no row matched.
    #[instrument(skip(self))]
    pub async fn mark_completed(&self, id: i64, file_path: &str) -> Result<()> {
        let result = sqlx::query(
            r"UPDATE download_submissions
              SET status = 'completed', file_path = ?, updated_at = datetime('now')
              WHERE id = ?",
        )
        .bind(file_path)
        .bind(id)
        .execute(self.db.pool())
        .await?;
        check_affected(id, result.rows_affected())
    }

    /// Increments `attempt_count` and transitions to `Failed` with the
    /// given error (§4.5 step 2). Returns the new `attempt_count` so the
    /// caller can decide whether to log the "bad file" ERROR (at 3).
    ///
    /// # Errors
    /// Returns [`CatalogError::NotFound`] if no row matched.
    #[instrument(skip(self))]
    pub async fn mark_failed(&self, id: i64, error: &str) -> Result<i64> {
        let row: Option<(i64,)> = sqlx::query_as(
            r"UPDATE download_submissions
              SET status = 'failed', attempt_count = attempt_count + 1, last_error = ?,
                  updated_at = datetime('now')
              WHERE id = ?
              RETURNING attempt_count",
        )
        .bind(error)
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some((attempt_count,)) => Ok(attempt_count),
            None => Err(CatalogError::NotFound(id)),
        }
    }

    /// Transitions a completed submission whose import raised an error
    /// to `ImportFailed`, preserving `file_path` (§9 resolved Open
    /// Question).
    ///
    /// # Errors
    /// Returns [`CatalogError::NotFound`] if no row matched.
    #[instrument(skip(self))]
    pub async fn mark_import_failed(&self, id: i64, error: &str) -> Result<()> {
        let result = sqlx::query(
            r"UPDATE download_submissions
              SET status = 'import_failed', last_error = ?, updated_at = datetime('now')
              WHERE id = ?",
        )
        .bind(error)
        .bind(id)
        .execute(self.db.pool())
        .await?;
        check_affected(id, result.rows_affected())
    }

    /// Clears `file_path` as the "processed" marker, leaving `state`
    /// unchanged (`Completed ∧ file_path = null`). Must be called in the
    /// same transaction as the `LibraryEntry` insert (§5 critical
    /// invariant); callers use [`Database::pool`] inside a
    /// `sqlx::Transaction` to satisfy this, see [`crate::importer`].
    ///
    /// # Errors
    /// Returns [`CatalogError::NotFound`] if no row matched.
    #[instrument(skip(self, tx))]
    pub async fn clear_file_path_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        id: i64,
    ) -> Result<()> {
        let result = sqlx::query(
            r"UPDATE download_submissions
              SET file_path = NULL, updated_at = datetime('now')
              WHERE id = ?",
        )
        .bind(id)
        .execute(&mut **tx)
        .await?;
        check_affected(id, result.rows_affected())
    }

    /// Returns a database connection handle, for callers (the Import
    /// Pipeline) that need to open their own transaction spanning both
    /// the submission update and the library insert.
    #[must_use]
    pub fn db(&self) -> &Database {
        &self.db
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn store() -> SubmissionStore {
        let db = Database::new_in_memory().await.expect("in-memory db");
        // Submissions reference a tracking row via FK; seed one.
        sqlx::query(
            "INSERT INTO periodical_tracking (olid, title) VALUES ('wired', 'Wired')",
        )
        .execute(db.pool())
        .await
        .unwrap();
        SubmissionStore::new(db)
    }

    #[tokio::test]
    async fn test_create_and_get_roundtrip() {
        let store = store().await;
        let id = store
            .create(
                1,
                None,
                SubmissionState::Pending,
                Some("job-1"),
                "https://example.com/wired.nzb",
                "Wired December 2023",
                Some("wired-december"),
                Some("sabnzbd"),
                None,
            )
            .await
            .unwrap();

        let submission = store.get(id).await.unwrap().unwrap();
        assert_eq!(submission.state(), SubmissionState::Pending);
        assert_eq!(submission.attempt_count, 1);
    }

    #[tokio::test]
    async fn test_mark_failed_increments_attempt_count() {
        let store = store().await;
        let id = store
            .create(
                1,
                None,
                SubmissionState::Downloading,
                Some("job-1"),
                "https://example.com/wired.nzb",
                "Wired",
                Some("wired"),
                None,
                None,
            )
            .await
            .unwrap();

        let first = store.mark_failed(id, "timeout").await.unwrap();
        assert_eq!(first, 2);
        let second = store.mark_failed(id, "timeout again").await.unwrap();
        assert_eq!(second, 3);

        let submission = store.get(id).await.unwrap().unwrap();
        assert_eq!(submission.state(), SubmissionState::Failed);
        assert_eq!(submission.last_error.as_deref(), Some("timeout again"));
    }

    #[tokio::test]
    async fn test_bad_file_urls_requires_three_failures() {
        let store = store().await;
        let id = store
            .create(
                1,
                None,
                SubmissionState::Downloading,
                Some("job-1"),
                "https://example.com/bad.nzb",
                "Bad",
                Some("bad"),
                None,
                None,
            )
            .await
            .unwrap();

        store.mark_failed(id, "e1").await.unwrap();
        assert!(store.bad_file_urls().await.unwrap().is_empty());
        store.mark_failed(id, "e2").await.unwrap();
        assert!(store.bad_file_urls().await.unwrap().is_empty());
        let third = store.mark_failed(id, "e3").await.unwrap();
        assert_eq!(third, 3);
        assert!(
            store
                .bad_file_urls()
                .await
                .unwrap()
                .contains("https://example.com/bad.nzb")
        );
    }

    #[tokio::test]
    async fn test_active_group_keys_excludes_skipped_and_failed() {
        let store = store().await;
        store
            .create(
                1,
                None,
                SubmissionState::Pending,
                Some("job-1"),
                "u1",
                "t1",
                Some("group-a"),
                None,
                None,
            )
            .await
            .unwrap();
        store
            .create(
                1,
                None,
                SubmissionState::Skipped,
                None,
                "u2",
                "t2",
                Some("group-b"),
                None,
                None,
            )
            .await
            .unwrap();

        let active = store.active_group_keys(1).await.unwrap();
        assert!(active.contains("group-a"));
        assert!(!active.contains("group-b"));
    }

    #[tokio::test]
    async fn test_mark_completed_then_clear_file_path_in_tx() {
        let store = store().await;
        let id = store
            .create(
                1,
                None,
                SubmissionState::Downloading,
                Some("job-1"),
                "u1",
                "t1",
                Some("group-a"),
                None,
                None,
            )
            .await
            .unwrap();
        store.mark_completed(id, "/downloads/t1.pdf").await.unwrap();

        let mut tx = store.db().pool().begin().await.unwrap();
        SubmissionStore::clear_file_path_in_tx(&mut tx, id).await.unwrap();
        tx.commit().await.unwrap();

        let submission = store.get(id).await.unwrap().unwrap();
        assert_eq!(submission.state(), SubmissionState::Completed);
        assert!(submission.file_path.is_none());
    }
}
