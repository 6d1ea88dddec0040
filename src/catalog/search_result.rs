//! `SearchResult`: a provider-returned candidate for a tracked title.

use serde_json::Value;
use sqlx::FromRow;
use tracing::instrument;

use super::error::Result;
use crate::db::Database;

/// A provider-returned candidate for a tracked title (§3.1). Retained as
/// an audit trail; not authoritative state.
#[derive(Debug, Clone, FromRow)]
pub struct SearchResultRow {
    pub id: i64,
    pub tracking_id: i64,
    pub provider: String,
    pub query: String,
    pub title: String,
    pub url: String,
    pub publication_date: Option<String>,
    #[sqlx(rename = "raw_metadata")]
    raw_metadata_json: String,
    pub fuzzy_match_group_id: Option<String>,
    pub created_at: String,
}

impl SearchResultRow {
    /// Parses `raw_metadata` as an opaque JSON value.
    ///
    /// # Errors
    /// Returns [`super::error::CatalogError::Metadata`] on malformed JSON.
    pub fn raw_metadata(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.raw_metadata_json)?)
    }
}

/// Typed persistence for [`SearchResultRow`]s.
#[derive(Debug, Clone)]
pub struct SearchResultStore {
    db: Database,
}

impl SearchResultStore {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persists a search result row. Callers treat failures as
    /// best-effort (§4.4 step 7: "survives on failure") — a write
    /// failure here must not abort the submit attempt that follows it.
    ///
    /// # Errors
    /// Returns [`super::error::CatalogError::Database`] on query failure.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self, raw_metadata), fields(tracking_id, provider = %provider))]
    pub async fn insert(
        &self,
        tracking_id: i64,
        provider: &str,
        query: &str,
        title: &str,
        url: &str,
        publication_date: Option<&str>,
        raw_metadata: &Value,
        fuzzy_match_group_id: Option<&str>,
    ) -> Result<i64> {
        let raw_metadata_json = serde_json::to_string(raw_metadata)?;
        let row: (i64,) = sqlx::query_as(
            r"INSERT INTO search_results (
                tracking_id, provider, query, title, url, publication_date, raw_metadata,
                fuzzy_match_group_id
              ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
              RETURNING id",
        )
        .bind(tracking_id)
        .bind(provider)
        .bind(query)
        .bind(title)
        .bind(url)
        .bind(publication_date)
        .bind(raw_metadata_json)
        .bind(fuzzy_match_group_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(row.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_search_result() {
        let db = Database::new_in_memory().await.unwrap();
        sqlx::query("INSERT INTO periodical_tracking (olid, title) VALUES ('wired', 'Wired')")
            .execute(db.pool())
            .await
            .unwrap();
        let store = SearchResultStore::new(db);

        let id = store
            .insert(
                1,
                "rss",
                "Wired",
                "Wired December 2023",
                "https://example.com/wired-dec.nzb",
                Some("2023-12-01"),
                &json!({"guid": "abc"}),
                Some("wired-december"),
            )
            .await
            .unwrap();

        assert!(id > 0);
    }
}
