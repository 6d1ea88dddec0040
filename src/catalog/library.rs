//! `LibraryEntry`: a catalog record for an imported file.

use chrono::NaiveDate;
use serde_json::Value;
use sqlx::FromRow;
use tracing::instrument;

use super::error::Result;
use crate::db::Database;

/// A catalog record for an imported file (§3.1). `file_path` is unique
/// across all entries and owns the physical file on disk.
#[derive(Debug, Clone, FromRow)]
pub struct LibraryEntry {
    pub id: i64,
    pub issn: Option<String>,
    pub title: String,
    pub language: String,
    pub publisher: Option<String>,
    #[sqlx(rename = "issue_date")]
    issue_date_str: String,
    pub file_path: String,
    pub cover_path: Option<String>,
    #[sqlx(rename = "extra_metadata")]
    extra_metadata_json: String,
    pub created_at: String,
    pub updated_at: String,
}

impl LibraryEntry {
    /// Parses `issue_date` as a calendar date.
    ///
    /// # Panics
    /// Never under normal operation: all writers of this column go
    /// through [`LibraryStore::insert_in_tx`], which only accepts a
    /// [`NaiveDate`]. A malformed value indicates out-of-band database
    /// corruption.
    #[must_use]
    pub fn issue_date(&self) -> NaiveDate {
        NaiveDate::parse_from_str(&self.issue_date_str, "%Y-%m-%d").unwrap_or_else(|_| {
            // Out-of-band corruption, not a reachable application path;
            // fall back to the epoch rather than panicking a running service.
            NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
        })
    }

    /// Parses `extra_metadata` as an opaque JSON value.
    ///
    /// # Errors
    /// Returns [`super::error::CatalogError::Metadata`] on malformed JSON.
    pub fn extra_metadata(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.extra_metadata_json)?)
    }
}

/// Typed persistence for [`LibraryEntry`] rows.
#[derive(Debug, Clone)]
pub struct LibraryStore {
    db: Database,
}

impl LibraryStore {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[must_use]
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Every library entry, for the Import Pipeline's O(N)
    /// title/date-window duplicate check (§4.6 step 3, §4.9).
    ///
    /// # Errors
    /// Returns [`super::error::CatalogError::Database`] on query failure.
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<LibraryEntry>> {
        let rows = sqlx::query_as::<_, LibraryEntry>("SELECT * FROM periodicals ORDER BY id ASC")
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows)
    }

    /// Inserts a library entry as part of an existing transaction. The
    /// caller is responsible for also clearing the originating
    /// submission's `file_path` in the *same* transaction (§5 critical
    /// invariant) and committing once.
    ///
    /// # Errors
    /// Returns [`super::error::CatalogError::Database`] on query failure
    /// (including the `file_path` `UNIQUE` constraint), or
    /// [`super::error::CatalogError::Metadata`] if `extra_metadata` fails
    /// to serialize.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(tx, extra_metadata), fields(title = %title))]
    pub async fn insert_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        issn: Option<&str>,
        title: &str,
        language: &str,
        publisher: Option<&str>,
        issue_date: NaiveDate,
        file_path: &str,
        cover_path: Option<&str>,
        extra_metadata: &Value,
    ) -> Result<i64> {
        let extra_metadata_json = serde_json::to_string(extra_metadata)?;
        let row: (i64,) = sqlx::query_as(
            r"INSERT INTO periodicals (
                issn, title, language, publisher, issue_date, file_path, cover_path,
                extra_metadata
              ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
              RETURNING id",
        )
        .bind(issn)
        .bind(title)
        .bind(language)
        .bind(publisher)
        .bind(issue_date.format("%Y-%m-%d").to_string())
        .bind(file_path)
        .bind(cover_path)
        .bind(extra_metadata_json)
        .fetch_one(&mut **tx)
        .await?;

        Ok(row.0)
    }

    /// Updates a library entry's `cover_path`, used by Cover Cleanup
    /// (§4 "Cover Cleanup") after regenerating a missing cover.
    ///
    /// # Errors
    /// Returns [`super::error::CatalogError::NotFound`] if no row matched.
    #[instrument(skip(self))]
    pub async fn update_cover_path(&self, id: i64, cover_path: &str) -> Result<()> {
        let result = sqlx::query("UPDATE periodicals SET cover_path = ?, updated_at = datetime('now') WHERE id = ?")
            .bind(cover_path)
            .bind(id)
            .execute(self.db.pool())
            .await?;
        super::error::check_affected(id, result.rows_affected())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_in_tx_then_list_all() {
        let db = Database::new_in_memory().await.unwrap();
        let store = LibraryStore::new(db);
        let mut tx = store.db().pool().begin().await.unwrap();

        LibraryStore::insert_in_tx(
            &mut tx,
            None,
            "Wired",
            "English",
            None,
            NaiveDate::from_ymd_opt(2023, 12, 1).unwrap(),
            "/library/wired-2023-12.pdf",
            None,
            &json!({"category": "Magazines"}),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let entries = store.list_all().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Wired");
        assert_eq!(entries[0].issue_date().to_string(), "2023-12-01");
    }

    #[tokio::test]
    async fn test_insert_in_tx_rejects_duplicate_file_path() {
        let db = Database::new_in_memory().await.unwrap();
        let store = LibraryStore::new(db);

        let mut tx = store.db().pool().begin().await.unwrap();
        LibraryStore::insert_in_tx(
            &mut tx,
            None,
            "Wired",
            "English",
            None,
            NaiveDate::from_ymd_opt(2023, 12, 1).unwrap(),
            "/library/same.pdf",
            None,
            &json!({}),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let mut tx2 = store.db().pool().begin().await.unwrap();
        let result = LibraryStore::insert_in_tx(
            &mut tx2,
            None,
            "Wired",
            "English",
            None,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            "/library/same.pdf",
            None,
            &json!({}),
        )
        .await;
        assert!(result.is_err());
    }
}
