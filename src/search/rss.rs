//! RSS feed search provider, the reference `SearchProvider`
//! implementation. Grounded in the original `RSSProvider`: fetch a
//! fixed feed URL, filter entries by a case-insensitive substring match
//! against `query`, and map each surviving entry to a [`SearchHit`].

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::Client;
use serde_json::json;
use tracing::{info, instrument, warn};

use super::{Result, SearchProviderError, SearchHit, SearchProvider};

/// Searches a single RSS feed URL for entries whose title contains the
/// query string.
pub struct RssSearchProvider {
    name: String,
    feed_url: String,
    client: Client,
}

impl RssSearchProvider {
    /// Creates a provider for the given feed.
    ///
    /// # Errors
    /// Returns [`SearchProviderError::Configuration`] if `feed_url` is empty.
    pub fn new(name: impl Into<String>, feed_url: impl Into<String>) -> Result<Self> {
        let feed_url = feed_url.into();
        if feed_url.trim().is_empty() {
            return Err(SearchProviderError::Configuration("feed_url is required".into()));
        }
        Ok(Self { name: name.into(), feed_url, client: Client::new() })
    }
}

#[async_trait]
impl SearchProvider for RssSearchProvider {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(provider = %self.name, feed_url = %self.feed_url))]
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let bytes = self
            .client
            .get(&self.feed_url)
            .send()
            .await
            .map_err(|error| SearchProviderError::Transport(error.to_string()))?
            .bytes()
            .await
            .map_err(|error| SearchProviderError::Transport(error.to_string()))?;

        let channel = ::rss::Channel::read_from(&bytes[..])
            .map_err(|error| SearchProviderError::Parse(error.to_string()))?;

        let query_lower = query.to_lowercase();
        let mut hits = Vec::new();

        for item in channel.items() {
            let title = item.title().unwrap_or_default();
            if !title.to_lowercase().contains(&query_lower) {
                continue;
            }

            let publication_date = item.pub_date().and_then(parse_rfc2822_date);
            if item.pub_date().is_some() && publication_date.is_none() {
                warn!(title, "RSS entry had an unparseable pub_date; omitting date");
            }

            hits.push(SearchHit {
                title: title.to_string(),
                url: item.link().unwrap_or_default().to_string(),
                publication_date,
                raw_metadata: json!({
                    "summary": item.description().unwrap_or_default(),
                    "guid": item.guid().map(rss::Guid::value).unwrap_or_default(),
                }),
            });
        }

        info!(count = hits.len(), query, "RSS search complete");
        Ok(hits)
    }
}

fn parse_rfc2822_date(raw: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc2822(raw).ok().map(|dt| dt.date_naive())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_empty_feed_url() {
        let result = RssSearchProvider::new("wired-rss", "");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_rfc2822_date() {
        let parsed = parse_rfc2822_date("Fri, 01 Dec 2023 00:00:00 GMT");
        assert_eq!(parsed, NaiveDate::from_ymd_opt(2023, 12, 1));
    }

    #[test]
    fn test_parse_rfc2822_date_rejects_garbage() {
        assert!(parse_rfc2822_date("not a date").is_none());
    }
}
