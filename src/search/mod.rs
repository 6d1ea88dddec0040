//! Search Provider capability (§4.11): the external-collaborator seam
//! the Download Orchestrator calls to turn a tracked title into a list
//! of candidate downloads. Mirrors the reference crate's `Resolver`
//! trait/registry pattern: a `#[async_trait]` trait object collection,
//! tried in order, with per-provider error isolation so one provider's
//! outage never blocks the others.

mod error;
mod rss;

pub use error::{Result, SearchProviderError};
pub use rss::RssSearchProvider;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tracing::warn;

/// A single candidate result returned by a provider's `search`.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// The result's full title as reported by the provider.
    pub title: String,
    /// The downloadable (or download-client-submittable) URL.
    pub url: String,
    /// Publication date, if the provider reports one.
    pub publication_date: Option<NaiveDate>,
    /// Opaque provider-specific metadata, persisted as an audit trail.
    pub raw_metadata: Value,
}

impl SearchHit {
    #[must_use]
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            publication_date: None,
            raw_metadata: Value::Null,
        }
    }
}

/// Trait every search provider implements.
///
/// # Object Safety
/// Uses `async_trait` so a `Vec<Box<dyn SearchProvider>>` registry is
/// possible; Rust 2024 native async traits are not dyn-compatible.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// The provider's name, persisted alongside every result it returns
    /// (`search_results.provider`).
    fn name(&self) -> &str;

    /// Searches for candidates matching `query` (the tracked title,
    /// already passed through [`crate::title::clean_title`] by the
    /// caller).
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>>;
}

/// An ordered collection of search providers, queried in registration
/// order. A provider that errors is logged and skipped; it never aborts
/// the batch (§4.4 step 2: "a provider outage must not block the
/// others").
#[derive(Default)]
pub struct SearchRegistry {
    providers: Vec<Box<dyn SearchProvider>>,
}

impl SearchRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { providers: Vec::new() }
    }

    pub fn register(&mut self, provider: Box<dyn SearchProvider>) {
        self.providers.push(provider);
    }

    /// Queries every registered provider for `query`, concatenating the
    /// results. Per-provider failures are logged at `warn` and otherwise
    /// swallowed.
    pub async fn search_all(&self, query: &str) -> Vec<(String, SearchHit)> {
        let mut hits = Vec::new();
        for provider in &self.providers {
            match provider.search(query).await {
                Ok(results) => {
                    hits.extend(results.into_iter().map(|hit| (provider.name().to_string(), hit)));
                }
                Err(error) => {
                    warn!(
                        provider = provider.name(),
                        error = %error,
                        "search provider failed; continuing with remaining providers"
                    );
                }
            }
        }
        hits
    }
}
