//! `TrackingRecord`: a user's declared intent to acquire a periodical.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use sqlx::FromRow;
use tracing::instrument;

use super::error::{CatalogError, Result, check_affected};
use crate::db::Database;

/// A user's declared intent to acquire a periodical (§3.1).
///
/// `track_all_editions`/`track_new_only`/neither are meant to be
/// mutually exclusive at the application level; the store does not
/// enforce this itself (it is a user-preference toggle, not an
/// invariant the database can usefully check).
#[derive(Debug, Clone, FromRow)]
pub struct TrackingRecord {
    pub id: i64,
    pub olid: String,
    pub title: String,
    pub publisher: Option<String>,
    pub issn: Option<String>,
    pub first_publish_year: Option<i64>,
    pub language: String,
    pub category: String,
    pub total_editions_known: i64,
    pub track_all_editions: bool,
    pub track_new_only: bool,
    #[sqlx(rename = "selected_editions")]
    selected_editions_json: String,
    #[sqlx(rename = "selected_years")]
    selected_years_json: String,
    pub delete_from_client_on_completion: bool,
    #[sqlx(rename = "periodical_metadata")]
    metadata_json: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TrackingRecord {
    /// Parses `selected_editions` into an edition-id -> tracked map.
    ///
    /// # Errors
    /// Returns [`CatalogError::Metadata`] if the stored JSON is malformed.
    pub fn selected_editions(&self) -> Result<HashMap<String, bool>> {
        Ok(serde_json::from_str(&self.selected_editions_json)?)
    }

    /// Parses `selected_years` into a set of tracked years.
    ///
    /// # Errors
    /// Returns [`CatalogError::Metadata`] if the stored JSON is malformed.
    pub fn selected_years(&self) -> Result<HashSet<i32>> {
        Ok(serde_json::from_str(&self.selected_years_json)?)
    }

    /// Returns the opaque `periodical_metadata` as a JSON value.
    ///
    /// # Errors
    /// Returns [`CatalogError::Metadata`] if the stored JSON is malformed.
    pub fn metadata(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.metadata_json)?)
    }

    /// Looks up an edition-id field from `metadata` following the
    /// documented key-precedence list (`olid` before `edition_id`),
    /// per the tagged-access convention in the Design Notes (§9).
    pub fn metadata_edition_id(&self) -> Option<String> {
        let value = self.metadata().ok()?;
        for key in ["olid", "edition_id"] {
            if let Some(found) = value.get(key).and_then(Value::as_str) {
                return Some(found.to_string());
            }
        }
        None
    }
}

/// Fields needed to create or update a tracking record.
#[derive(Debug, Clone)]
pub struct NewTrackingRecord<'a> {
    pub olid: &'a str,
    pub title: &'a str,
    pub publisher: Option<&'a str>,
    pub issn: Option<&'a str>,
    pub first_publish_year: Option<i64>,
    pub language: &'a str,
    pub category: &'a str,
    pub track_all_editions: bool,
    pub track_new_only: bool,
    pub selected_editions: &'a HashMap<String, bool>,
    pub selected_years: &'a HashSet<i32>,
    pub delete_from_client_on_completion: bool,
    pub metadata: &'a Value,
}

/// Typed persistence for [`TrackingRecord`] rows.
#[derive(Debug, Clone)]
pub struct TrackingStore {
    db: Database,
}

impl TrackingStore {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Creates a tracking record, or updates the existing one sharing its
    /// `olid`, returning the row id either way.
    ///
    /// # Errors
    /// Returns [`CatalogError::Database`] on query failure or
    /// [`CatalogError::Metadata`] if the JSON columns fail to serialize.
    #[instrument(skip(self, record), fields(olid = %record.olid))]
    pub async fn upsert(&self, record: &NewTrackingRecord<'_>) -> Result<i64> {
        let selected_editions = serde_json::to_string(record.selected_editions)?;
        let selected_years = serde_json::to_string(record.selected_years)?;
        let metadata = serde_json::to_string(record.metadata)?;

        let row: (i64,) = sqlx::query_as(
            r"INSERT INTO periodical_tracking (
                olid, title, publisher, issn, first_publish_year, language, category,
                track_all_editions, track_new_only, selected_editions, selected_years,
                delete_from_client_on_completion, periodical_metadata
              ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
              ON CONFLICT(olid) DO UPDATE SET
                title = excluded.title,
                publisher = excluded.publisher,
                issn = excluded.issn,
                first_publish_year = excluded.first_publish_year,
                language = excluded.language,
                category = excluded.category,
                track_all_editions = excluded.track_all_editions,
                track_new_only = excluded.track_new_only,
                selected_editions = excluded.selected_editions,
                selected_years = excluded.selected_years,
                delete_from_client_on_completion = excluded.delete_from_client_on_completion,
                periodical_metadata = excluded.periodical_metadata,
                updated_at = datetime('now')
              RETURNING id",
        )
        .bind(record.olid)
        .bind(record.title)
        .bind(record.publisher)
        .bind(record.issn)
        .bind(record.first_publish_year)
        .bind(record.language)
        .bind(record.category)
        .bind(record.track_all_editions)
        .bind(record.track_new_only)
        .bind(selected_editions)
        .bind(selected_years)
        .bind(record.delete_from_client_on_completion)
        .bind(metadata)
        .fetch_one(self.db.pool())
        .await?;

        Ok(row.0)
    }

    /// Fetches a tracking record by id.
    ///
    /// # Errors
    /// Returns [`CatalogError::Database`] on query failure.
    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<Option<TrackingRecord>> {
        let record = sqlx::query_as::<_, TrackingRecord>(
            "SELECT * FROM periodical_tracking WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(record)
    }

    /// Fetches a tracking record by its external identity (`olid`).
    ///
    /// # Errors
    /// Returns [`CatalogError::Database`] on query failure.
    #[instrument(skip(self))]
    pub async fn get_by_olid(&self, olid: &str) -> Result<Option<TrackingRecord>> {
        let record = sqlx::query_as::<_, TrackingRecord>(
            "SELECT * FROM periodical_tracking WHERE olid = ?",
        )
        .bind(olid)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(record)
    }

    /// Lists every tracking record with at least one acquisition mode
    /// active (`track_all_editions`, `track_new_only`, or a non-empty
    /// `selected_editions`), used by the Auto-Download task (§4.8).
    ///
    /// # Errors
    /// Returns [`CatalogError::Database`] on query failure.
    #[instrument(skip(self))]
    pub async fn list_active(&self) -> Result<Vec<TrackingRecord>> {
        let records = sqlx::query_as::<_, TrackingRecord>(
            r"SELECT * FROM periodical_tracking
              WHERE track_all_editions = 1
                 OR track_new_only = 1
                 OR selected_editions != '{}'
              ORDER BY id ASC",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(records)
    }

    /// Deletes a tracking record by id. Does not cascade to submissions
    /// or library entries (§3.1 lifecycle: "does not cascade to library
    /// files").
    ///
    /// # Errors
    /// Returns [`CatalogError::NotFound`] if no row matched, or
    /// [`CatalogError::Database`] on query failure.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM periodical_tracking WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await?;
        check_affected(id, result.rows_affected())
    }

    /// Deletes a tracking record by its `olid`, if one exists. Used by
    /// the Import Pipeline's `tracking_mode = none` side effect (§4.6
    /// step 8), which is a no-op rather than an error when there is
    /// nothing to delete.
    ///
    /// # Errors
    /// Returns [`CatalogError::Database`] on query failure.
    #[instrument(skip(self))]
    pub async fn delete_by_olid(&self, olid: &str) -> Result<()> {
        sqlx::query("DELETE FROM periodical_tracking WHERE olid = ?")
            .bind(olid)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn test_db() -> Database {
        Database::new_in_memory().await.expect("in-memory db")
    }

    fn sample<'a>(olid: &'a str, title: &'a str, editions: &'a HashMap<String, bool>, years: &'a HashSet<i32>, metadata: &'a Value) -> NewTrackingRecord<'a> {
        NewTrackingRecord {
            olid,
            title,
            publisher: None,
            issn: None,
            first_publish_year: None,
            language: "English",
            category: "Magazines",
            track_all_editions: true,
            track_new_only: false,
            selected_editions: editions,
            selected_years: years,
            delete_from_client_on_completion: false,
            metadata,
        }
    }

    #[tokio::test]
    async fn test_upsert_then_get_roundtrip() {
        let store = TrackingStore::new(test_db().await);
        let editions = HashMap::new();
        let years = HashSet::new();
        let metadata = json!({});
        let id = store
            .upsert(&sample("wired", "Wired", &editions, &years, &metadata))
            .await
            .unwrap();

        let fetched = store.get(id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "Wired");
        assert!(fetched.track_all_editions);
        assert!(fetched.selected_editions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_on_olid() {
        let store = TrackingStore::new(test_db().await);
        let editions = HashMap::new();
        let years = HashSet::new();
        let metadata = json!({});

        let first_id = store
            .upsert(&sample("wired", "Wired", &editions, &years, &metadata))
            .await
            .unwrap();
        let second_id = store
            .upsert(&sample("wired", "Wired UK", &editions, &years, &metadata))
            .await
            .unwrap();

        assert_eq!(first_id, second_id);
        let fetched = store.get(first_id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "Wired UK");
    }

    #[tokio::test]
    async fn test_list_active_excludes_untracked_records() {
        let store = TrackingStore::new(test_db().await);
        let editions = HashMap::new();
        let years = HashSet::new();
        let metadata = json!({});

        let mut untracked = sample("untracked", "Untracked", &editions, &years, &metadata);
        untracked.track_all_editions = false;
        store.upsert(&untracked).await.unwrap();
        store
            .upsert(&sample("wired", "Wired", &editions, &years, &metadata))
            .await
            .unwrap();

        let active = store.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].olid, "wired");
    }

    #[tokio::test]
    async fn test_delete_by_olid_is_noop_when_missing() {
        let store = TrackingStore::new(test_db().await);
        let result = store.delete_by_olid("does-not-exist").await;
        assert!(result.is_ok());
    }
}
