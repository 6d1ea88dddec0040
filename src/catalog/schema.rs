//! Additive schema evolution (§4.3): compares a declared "expected
//! columns per table" map against the introspected schema at startup and
//! issues `ALTER TABLE ... ADD COLUMN` for anything missing. Never
//! destructive, always idempotent — running it against an up-to-date
//! database is a no-op.

use sqlx::{Row, SqlitePool};
use tracing::{info, instrument};

use super::error::Result;

/// One table's declared column set, paired with the `ALTER TABLE`
/// fragment to use for any column found missing (SQLite requires a
/// default or nullable column for `ADD COLUMN` on a non-empty table).
struct ExpectedTable {
    table: &'static str,
    columns: &'static [(&'static str, &'static str)],
}

/// The full set of tables this crate's schema evolution manages.
///
/// This mirrors `migrations/0001_init.sql`; it exists independently so
/// that a column added here during development and only later folded
/// into a new migration file still self-heals databases created by an
/// older binary.
const EXPECTED_TABLES: &[ExpectedTable] = &[
    ExpectedTable {
        table: "periodical_tracking",
        columns: &[
            ("olid", "TEXT NOT NULL DEFAULT ''"),
            ("title", "TEXT NOT NULL DEFAULT ''"),
            ("publisher", "TEXT"),
            ("issn", "TEXT"),
            ("first_publish_year", "INTEGER"),
            ("language", "TEXT NOT NULL DEFAULT 'English'"),
            ("category", "TEXT NOT NULL DEFAULT 'Magazines'"),
            ("total_editions_known", "INTEGER NOT NULL DEFAULT 0"),
            ("track_all_editions", "INTEGER NOT NULL DEFAULT 0"),
            ("track_new_only", "INTEGER NOT NULL DEFAULT 0"),
            ("selected_editions", "TEXT NOT NULL DEFAULT '{}'"),
            ("selected_years", "TEXT NOT NULL DEFAULT '[]'"),
            ("delete_from_client_on_completion", "INTEGER NOT NULL DEFAULT 0"),
            ("periodical_metadata", "TEXT NOT NULL DEFAULT '{}'"),
        ],
    },
    ExpectedTable {
        table: "search_results",
        columns: &[
            ("provider", "TEXT NOT NULL DEFAULT ''"),
            ("query", "TEXT NOT NULL DEFAULT ''"),
            ("title", "TEXT NOT NULL DEFAULT ''"),
            ("url", "TEXT NOT NULL DEFAULT ''"),
            ("publication_date", "TEXT"),
            ("raw_metadata", "TEXT NOT NULL DEFAULT '{}'"),
            ("fuzzy_match_group_id", "TEXT"),
        ],
    },
    ExpectedTable {
        table: "download_submissions",
        columns: &[
            ("job_id", "TEXT"),
            ("source_url", "TEXT NOT NULL DEFAULT ''"),
            ("result_title", "TEXT NOT NULL DEFAULT ''"),
            ("fuzzy_match_group", "TEXT"),
            ("client_name", "TEXT"),
            ("attempt_count", "INTEGER NOT NULL DEFAULT 1"),
            ("last_error", "TEXT"),
            ("file_path", "TEXT"),
        ],
    },
    ExpectedTable {
        table: "periodicals",
        columns: &[
            ("issn", "TEXT"),
            ("title", "TEXT NOT NULL DEFAULT ''"),
            ("language", "TEXT NOT NULL DEFAULT 'English'"),
            ("publisher", "TEXT"),
            ("cover_path", "TEXT"),
            ("extra_metadata", "TEXT NOT NULL DEFAULT '{}'"),
        ],
    },
];

/// Introspects every declared table and adds any column missing from the
/// live schema. Safe to call on every startup.
///
/// # Errors
/// Returns [`super::error::CatalogError::Database`] if introspection or
/// an `ALTER TABLE` statement fails.
#[instrument(skip(pool))]
pub async fn evolve_schema(pool: &SqlitePool) -> Result<()> {
    for expected in EXPECTED_TABLES {
        let existing_columns = introspect_columns(pool, expected.table).await?;

        for (column, definition) in expected.columns {
            if existing_columns.iter().any(|existing| existing == column) {
                continue;
            }

            info!(table = expected.table, column, "adding missing column");
            let statement =
                format!("ALTER TABLE {} ADD COLUMN {column} {definition}", expected.table);
            sqlx::query(&statement).execute(pool).await?;
        }
    }

    Ok(())
}

async fn introspect_columns(pool: &SqlitePool, table: &str) -> Result<Vec<String>> {
    let rows = sqlx::query(&format!("PRAGMA table_info({table})"))
        .fetch_all(pool)
        .await?;

    Ok(rows.iter().map(|row| row.get::<String, _>("name")).collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test]
    async fn test_evolve_schema_is_noop_on_fresh_database() {
        let db = Database::new_in_memory().await.unwrap();
        // Migrations already created every expected column; a second
        // pass must not error and must not change anything observable.
        let result = evolve_schema(db.pool()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_evolve_schema_adds_missing_column() {
        let db = Database::new_in_memory().await.unwrap();
        sqlx::query("ALTER TABLE periodicals DROP COLUMN cover_path")
            .execute(db.pool())
            .await
            .expect("sqlite supports DROP COLUMN for this test setup");

        evolve_schema(db.pool()).await.unwrap();

        let columns = introspect_columns(db.pool(), "periodicals").await.unwrap();
        assert!(columns.iter().any(|c| c == "cover_path"));
    }
}
