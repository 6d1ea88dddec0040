//! Download Orchestrator (§4.4): turns a tracking record's acquisition
//! preferences into deduplicated, ordered, batch-capped download
//! submissions. This is the component with the most moving parts in
//! the crate — search, three independent filters, a stable sort, a
//! batch cap, then a per-result submit — so its steps stay split into
//! private helpers named after the spec steps they implement, in the
//! order §4.4 lists them.

mod error;

pub use error::{OrchestratorError, Result};

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::catalog::{
    SearchResultStore, SubmissionState, SubmissionStore, TrackingRecord, TrackingStore,
};
use crate::client::DownloadClient;
use crate::dedup::fuzzy_match_group_id;
use crate::parser::detect_language;
use crate::search::{SearchHit, SearchRegistry};
use crate::title::clean_title;

/// Result counts from one Orchestrator run, per §4.4 "Outputs".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrchestratorOutcome {
    pub submitted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// A search hit carried alongside the provider that returned it and its
/// dedup group key, threaded through the filter pipeline together so no
/// step needs to recompute either.
struct Candidate {
    provider: String,
    hit: SearchHit,
    group_key: String,
}

/// Runs the Download Orchestrator for one tracking record (§4.4).
///
/// # Errors
/// Returns [`OrchestratorError::TrackingNotFound`] if `tracking_id` does
/// not exist, or [`OrchestratorError::Catalog`] on a store failure that
/// is not itself one of the per-result failures step 7 already
/// classifies as a `Failed` submission.
#[instrument(skip(tracking_store, search_registry, submission_store, search_result_store, download_client))]
#[allow(clippy::too_many_arguments)]
pub async fn run(
    tracking_id: i64,
    tracking_store: &TrackingStore,
    search_registry: &SearchRegistry,
    submission_store: &SubmissionStore,
    search_result_store: &SearchResultStore,
    download_client: &dyn DownloadClient,
    max_per_batch: usize,
) -> Result<OrchestratorOutcome> {
    let tracking = tracking_store
        .get(tracking_id)
        .await?
        .ok_or(OrchestratorError::TrackingNotFound(tracking_id))?;

    let query = clean_title(&tracking.title);
    let hits = search_registry.search_all(&query).await;
    info!(tracking_id, query = %query, hit_count = hits.len(), "search providers returned results");

    let candidates: Vec<Candidate> = hits
        .into_iter()
        .map(|(provider, hit)| {
            let group_key = fuzzy_match_group_id(&hit.title);
            Candidate { provider, hit, group_key }
        })
        .collect();

    let bad_file_urls = submission_store.bad_file_urls().await?;
    let active_group_keys = submission_store.active_group_keys(tracking_id).await?;

    let (duplicates, survivors): (Vec<Candidate>, Vec<Candidate>) = candidates
        .into_iter()
        .filter(|candidate| !bad_file_urls.contains(&candidate.hit.url))
        .partition(|candidate| active_group_keys.contains(&candidate.group_key));

    let mode_filtered = apply_tracking_mode_filter(survivors, &tracking, submission_store).await?;
    let year_filtered = apply_selected_years_filter(mode_filtered, &tracking)?;

    let mut ordered = year_filtered;
    ordered.sort_by(|a, b| ordering_key(a).cmp(&ordering_key(b)));
    ordered.truncate(max_per_batch);

    let mut outcome = OrchestratorOutcome::default();

    for candidate in &duplicates {
        submission_store
            .create(
                tracking_id,
                None,
                SubmissionState::Skipped,
                None,
                &candidate.hit.url,
                &candidate.hit.title,
                Some(&candidate.group_key),
                None,
                None,
            )
            .await?;
        outcome.skipped += 1;
    }

    for candidate in ordered {
        let search_result_id = search_result_store
            .insert(
                tracking_id,
                &candidate.provider,
                &query,
                &candidate.hit.title,
                &candidate.hit.url,
                candidate.hit.publication_date.map(|d| d.to_string()).as_deref(),
                &candidate.hit.raw_metadata,
                Some(&candidate.group_key),
            )
            .await
            .inspect_err(|error| {
                warn!(tracking_id, url = %candidate.hit.url, %error, "failed to persist search result; continuing");
            })
            .ok();

        match download_client.submit(&candidate.hit.url, &candidate.hit.title).await {
            Ok(job_id) => {
                submission_store
                    .create(
                        tracking_id,
                        search_result_id,
                        SubmissionState::Pending,
                        Some(&job_id),
                        &candidate.hit.url,
                        &candidate.hit.title,
                        Some(&candidate.group_key),
                        Some(download_client.name()),
                        None,
                    )
                    .await?;
                outcome.submitted += 1;
            }
            Err(error) => {
                // §4.4 step 7: a rejected submission (the client's
                // "null/zero return") gets the fixed message spec.md
                // names; any other error keeps its own message.
                let last_error = match error {
                    crate::client::ClientError::Rejected(_) => "Client rejected submission".to_string(),
                    other => other.to_string(),
                };
                submission_store
                    .create(
                        tracking_id,
                        search_result_id,
                        SubmissionState::Failed,
                        None,
                        &candidate.hit.url,
                        &candidate.hit.title,
                        Some(&candidate.group_key),
                        Some(download_client.name()),
                        Some(&last_error),
                    )
                    .await?;
                outcome.failed += 1;
            }
        }
    }

    info!(tracking_id, ?outcome, "orchestrator run complete");
    Ok(outcome)
}

/// §4.4 step 4, tracking-mode filter.
async fn apply_tracking_mode_filter(
    candidates: Vec<Candidate>,
    tracking: &TrackingRecord,
    submission_store: &SubmissionStore,
) -> Result<Vec<Candidate>> {
    if tracking.track_all_editions {
        return Ok(candidates);
    }

    if tracking.track_new_only {
        let newest = submission_store.newest_submission_created_at(tracking.id).await?;
        let newest_date = newest.as_deref().and_then(parse_sqlite_timestamp).map(|dt| dt.date());
        return Ok(candidates
            .into_iter()
            .filter(|candidate| match (newest_date, candidate.hit.publication_date) {
                (Some(newest), Some(pub_date)) => pub_date >= newest,
                // No prior submission, or the result carries no date: cannot
                // be ruled out, so it is kept (§4.4 step 4: "or, if no prior
                // submission, all").
                _ => true,
            })
            .collect());
    }

    // Neither flag set: only explicitly selected editions.
    let selected_editions = tracking.selected_editions()?;
    Ok(candidates
        .into_iter()
        .filter(|candidate| {
            derive_edition_id(candidate, tracking)
                .is_some_and(|edition_id| selected_editions.get(&edition_id).copied().unwrap_or(false))
        })
        .collect())
}

/// §4.4 step 4, trailing `selected_years` restriction (applies on top of
/// whichever tracking-mode branch ran, per spec.md: "If `selected_years`
/// is non-empty, further restrict...").
fn apply_selected_years_filter(candidates: Vec<Candidate>, tracking: &TrackingRecord) -> Result<Vec<Candidate>> {
    let selected_years = tracking.selected_years()?;
    if selected_years.is_empty() {
        return Ok(candidates);
    }

    Ok(candidates
        .into_iter()
        .filter(|candidate| candidate.hit.publication_date.is_some_and(|date| selected_years.contains(&date.year())))
        .collect())
}

/// Derives a result's edition id: `olid`/`edition_id` from its
/// `raw_metadata` first, falling back to a fuzzy title match against
/// the tracking record's `metadata.editions` list (§9 tagged-access
/// convention, extended per §4.4 step 4's "or fuzzy-matched title"
/// clause).
fn derive_edition_id(candidate: &Candidate, tracking: &TrackingRecord) -> Option<String> {
    for key in ["olid", "edition_id"] {
        if let Some(value) = candidate.hit.raw_metadata.get(key).and_then(Value::as_str) {
            return Some(value.to_string());
        }
    }

    let metadata = tracking.metadata().ok()?;
    let editions = metadata.get("editions")?.as_array()?;

    let mut best: Option<(String, u8)> = None;
    for edition in editions {
        let Some(edition_title) = edition.get("title").and_then(Value::as_str) else { continue };
        let Some(edition_id) = edition_id_of(edition) else { continue };
        let score = crate::title::similarity(&candidate.hit.title, edition_title);
        if best.as_ref().is_none_or(|(_, best_score)| score > *best_score) {
            best = Some((edition_id, score));
        }
    }
    best.map(|(id, _)| id)
}

fn edition_id_of(edition: &Value) -> Option<String> {
    let id = edition.get("id")?;
    id.as_str().map(str::to_string).or_else(|| id.as_i64().map(|n| n.to_string()))
}

/// §4.4 step 5 ordering key: English first, then other languages
/// alphabetically, then publication date descending within each
/// language group. Language is derived from the result title itself
/// (`SearchHit` carries no explicit language field) via the same
/// detector the Filename/Path Parser uses, since the spec's "mixed
/// language result list" implies per-result language is already
/// knowable from the title text.
fn ordering_key(candidate: &Candidate) -> (u8, String, std::cmp::Reverse<NaiveDate>) {
    let language = detect_language(&candidate.hit.title);
    let language_rank = if language.eq_ignore_ascii_case("english") { 0 } else { 1 };
    let date = candidate.hit.publication_date.unwrap_or(NaiveDate::MIN);
    (language_rank, language, std::cmp::Reverse(date))
}

fn parse_sqlite_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::TrackingStore;
    use crate::client::{ClientStatus, CompletedJob};
    use crate::db::Database;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    struct StubProvider {
        hits: Vec<SearchHit>,
    }

    #[async_trait]
    impl crate::search::SearchProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        async fn search(&self, _query: &str) -> crate::search::Result<Vec<SearchHit>> {
            Ok(self.hits.clone())
        }
    }

    struct StubClient {
        next_job_id: Mutex<i64>,
        reject_all: bool,
    }

    impl StubClient {
        fn accepting() -> Self {
            Self { next_job_id: Mutex::new(1), reject_all: false }
        }

        fn rejecting() -> Self {
            Self { next_job_id: Mutex::new(1), reject_all: true }
        }
    }

    #[async_trait]
    impl DownloadClient for StubClient {
        fn name(&self) -> &str {
            "stub-client"
        }

        async fn submit(&self, _url: &str, _title: &str) -> crate::client::Result<String> {
            if self.reject_all {
                return Err(crate::client::ClientError::Rejected("rejected in test".into()));
            }
            let mut next = self.next_job_id.lock().unwrap();
            let job_id = format!("job-{next}");
            *next += 1;
            Ok(job_id)
        }

        async fn get_status(&self, _job_id: &str) -> crate::client::Result<ClientStatus> {
            Ok(ClientStatus::Queued)
        }

        async fn get_completed(&self) -> crate::client::Result<Vec<CompletedJob>> {
            Ok(Vec::new())
        }

        async fn delete(&self, _job_id: &str) -> crate::client::Result<()> {
            Ok(())
        }
    }

    async fn seed_tracking(db: &Database, all_editions: bool) -> i64 {
        let store = TrackingStore::new(db.clone());
        store
            .upsert(&crate::catalog::NewTrackingRecord {
                olid: "wired",
                title: "Wired",
                publisher: None,
                issn: None,
                first_publish_year: None,
                language: "English",
                category: "Magazines",
                track_all_editions: all_editions,
                track_new_only: false,
                selected_editions: &HashMap::new(),
                selected_years: &HashSet::new(),
                delete_from_client_on_completion: false,
                metadata: &json!({}),
            })
            .await
            .unwrap()
    }

    fn hit(title: &str, url: &str, date: Option<&str>) -> SearchHit {
        SearchHit {
            title: title.to_string(),
            url: url.to_string(),
            publication_date: date.and_then(|d| d.parse().ok()),
            raw_metadata: json!({}),
        }
    }

    #[tokio::test]
    async fn test_first_run_batch_cap_orders_english_first() {
        let db = Database::new_in_memory().await.unwrap();
        let tracking_id = seed_tracking(&db, true).await;

        let mut hits = Vec::new();
        for i in 0..5 {
            hits.push(hit(&format!("Wired English {i}"), &format!("https://x/en-{i}.nzb"), Some("2023-01-01")));
        }
        for i in 0..10 {
            hits.push(hit(&format!("Wired German {i}"), &format!("https://x/de-{i}.nzb"), Some("2023-01-01")));
        }

        let mut registry = SearchRegistry::new();
        registry.register(Box::new(StubProvider { hits }));

        let tracking_store = TrackingStore::new(db.clone());
        let submission_store = SubmissionStore::new(db.clone());
        let search_result_store = SearchResultStore::new(db.clone());
        let client = StubClient::accepting();

        let outcome = run(
            tracking_id,
            &tracking_store,
            &registry,
            &submission_store,
            &search_result_store,
            &client,
            10,
        )
        .await
        .unwrap();

        assert_eq!(outcome.submitted, 10);
        assert_eq!(outcome.skipped, 0);
        assert_eq!(outcome.failed, 0);
    }

    #[tokio::test]
    async fn test_dedup_produces_skipped_submission() {
        let db = Database::new_in_memory().await.unwrap();
        let tracking_id = seed_tracking(&db, true).await;
        let submission_store = SubmissionStore::new(db.clone());

        submission_store
            .create(
                tracking_id,
                None,
                SubmissionState::Completed,
                Some("job-existing"),
                "https://x/existing.nzb",
                "Wired Magazine - Dec 2023",
                Some(&fuzzy_match_group_id("Wired Magazine December 2023")),
                None,
                None,
            )
            .await
            .unwrap();

        let mut registry = SearchRegistry::new();
        registry.register(Box::new(StubProvider {
            hits: vec![hit("Wired Magazine December 2023", "https://x/new.nzb", Some("2023-12-01"))],
        }));

        let tracking_store = TrackingStore::new(db.clone());
        let search_result_store = SearchResultStore::new(db.clone());
        let client = StubClient::accepting();

        let outcome = run(
            tracking_id,
            &tracking_store,
            &registry,
            &submission_store,
            &search_result_store,
            &client,
            10,
        )
        .await
        .unwrap();

        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.submitted, 0);
    }

    #[tokio::test]
    async fn test_rejected_submit_creates_failed_submission() {
        let db = Database::new_in_memory().await.unwrap();
        let tracking_id = seed_tracking(&db, true).await;

        let mut registry = SearchRegistry::new();
        registry.register(Box::new(StubProvider {
            hits: vec![hit("Wired January 2024", "https://x/jan.nzb", Some("2024-01-01"))],
        }));

        let tracking_store = TrackingStore::new(db.clone());
        let submission_store = SubmissionStore::new(db.clone());
        let search_result_store = SearchResultStore::new(db.clone());
        let client = StubClient::rejecting();

        let outcome = run(
            tracking_id,
            &tracking_store,
            &registry,
            &submission_store,
            &search_result_store,
            &client,
            10,
        )
        .await
        .unwrap();

        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.submitted, 0);
    }

    #[tokio::test]
    async fn test_unknown_tracking_id_errors() {
        let db = Database::new_in_memory().await.unwrap();
        let registry = SearchRegistry::new();
        let tracking_store = TrackingStore::new(db.clone());
        let submission_store = SubmissionStore::new(db.clone());
        let search_result_store = SearchResultStore::new(db.clone());
        let client = StubClient::accepting();

        let result =
            run(9999, &tracking_store, &registry, &submission_store, &search_result_store, &client, 10).await;

        assert!(matches!(result, Err(OrchestratorError::TrackingNotFound(9999))));
    }
}
