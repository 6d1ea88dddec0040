//! SABnzbd download client backend, grounded in the original
//! `SABnzbdClient`: a thin JSON wrapper over SABnzbd's `/api` endpoint,
//! submitting by `mode=addurl` and polling status by scanning the
//! queue, then the history.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::{ClientError, ClientStatus, CompletedJob, DownloadClient, Result};

const API_TIMEOUT: Duration = Duration::from_secs(10);

/// SABnzbd backend for [`DownloadClient`].
pub struct SabnzbdClient {
    name: String,
    api_url: String,
    api_key: String,
    client: Client,
}

impl SabnzbdClient {
    /// Creates a client for a SABnzbd instance at `api_url` (no
    /// trailing slash) authenticated with `api_key`.
    ///
    /// # Errors
    /// Returns [`ClientError::Rejected`] if `api_key` is empty.
    pub fn new(name: impl Into<String>, api_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ClientError::Rejected("api_key is required".into()));
        }

        let client = Client::builder()
            .timeout(API_TIMEOUT)
            .build()
            .map_err(|error| ClientError::Transport(error.to_string()))?;

        Ok(Self { name: name.into(), api_url: api_url.into(), api_key, client })
    }

    /// Calls `{api_url}/api` with `action` plus `extra_params`, adding
    /// `output=json` and `apikey`. On any transport/parse failure this
    /// returns an empty JSON object, matching the original client's
    /// "log and return `{}`" behavior rather than surfacing the error,
    /// since callers treat a missing key as "not found" either way.
    #[instrument(skip(self), fields(client = %self.name, action))]
    async fn api_call(&self, action: &str, extra_params: &[(&str, &str)]) -> Value {
        let url = format!("{}/api", self.api_url);
        let mut params: Vec<(&str, &str)> = extra_params.to_vec();
        params.push(("action", action));
        params.push(("output", "json"));
        params.push(("apikey", &self.api_key));

        let response = match self.client.get(&url).query(&params).send().await {
            Ok(response) => response,
            Err(error) => {
                warn!(%error, "SABnzbd API transport error");
                return Value::Object(serde_json::Map::new());
            }
        };

        match response.error_for_status() {
            Ok(response) => response.json::<Value>().await.unwrap_or_else(|error| {
                warn!(%error, "SABnzbd API response was not valid JSON");
                Value::Object(serde_json::Map::new())
            }),
            Err(error) => {
                warn!(%error, "SABnzbd API returned an error status");
                Value::Object(serde_json::Map::new())
            }
        }
    }
}

#[async_trait]
impl DownloadClient for SabnzbdClient {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(client = %self.name, url, title))]
    async fn submit(&self, url: &str, title: &str) -> Result<String> {
        let mut params = vec![("mode", "addurl"), ("name", url)];
        if !title.is_empty() {
            params.push(("nzbname", title));
        }
        let response = self.api_call("add", &params).await;

        let accepted = response.get("status").and_then(Value::as_bool).unwrap_or(false);
        if !accepted {
            return Err(ClientError::Rejected(format!("SABnzbd rejected submission: {response}")));
        }

        response
            .get("nzo_ids")
            .and_then(Value::as_array)
            .and_then(|ids| ids.first())
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ClientError::Parse("SABnzbd response had no nzo_ids".into()))
    }

    #[instrument(skip(self), fields(client = %self.name, job_id))]
    async fn get_status(&self, job_id: &str) -> Result<ClientStatus> {
        let queue = self.api_call("queue", &[("mode", "queue")]).await;
        if let Some(slot) = find_slot(&queue, "queue", job_id) {
            let percentage = slot
                .get("percentage")
                .and_then(Value::as_str)
                .and_then(|value| value.parse::<f64>().ok())
                .map(|value| value.round().clamp(0.0, 100.0) as u8);

            return Ok(if slot.get("status").and_then(Value::as_str) == Some("Downloading") {
                ClientStatus::Downloading { percentage }
            } else {
                ClientStatus::Queued
            });
        }

        let history = self.api_call("history", &[("mode", "history")]).await;
        if let Some(slot) = find_slot(&history, "history", job_id) {
            let status = slot.get("status").and_then(Value::as_str).unwrap_or("Unknown").to_lowercase();

            if status.contains("completed") {
                let file_path = slot
                    .get("storage")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ClientError::Parse("completed history slot missing storage".into()))?;
                return Ok(ClientStatus::Completed { file_path: file_path.to_string() });
            }

            if status.contains("fail") || status.contains("abort") {
                let reason = slot
                    .get("fail_message")
                    .and_then(Value::as_str)
                    .unwrap_or("no details available");
                return Ok(ClientStatus::Failed { message: format!("download {status}: {reason}") });
            }

            debug!(status, "SABnzbd job in history with unrecognized status; treating as queued");
            return Ok(ClientStatus::Queued);
        }

        Err(ClientError::UnknownJob(job_id.to_string()))
    }

    #[instrument(skip(self), fields(client = %self.name))]
    async fn get_completed(&self) -> Result<Vec<CompletedJob>> {
        let history = self.api_call("history", &[("mode", "history")]).await;
        let slots = history
            .get("history")
            .and_then(|history| history.get("slots"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let completed = slots
            .iter()
            .filter(|slot| slot.get("status").and_then(Value::as_str) == Some("Completed"))
            .filter_map(|slot| {
                let job_id = slot.get("nzo_id").and_then(Value::as_str)?;
                let file_path = slot.get("storage").and_then(Value::as_str)?;
                Some(CompletedJob { job_id: job_id.to_string(), file_path: file_path.to_string() })
            })
            .collect();

        Ok(completed)
    }

    #[instrument(skip(self), fields(client = %self.name, job_id))]
    async fn delete(&self, job_id: &str) -> Result<()> {
        // The original SABnzbd client never implemented deletion; this
        // follows SABnzbd's documented history-delete action.
        self.api_call("history", &[("name", "delete"), ("value", job_id)]).await;
        Ok(())
    }
}

/// Finds the slot matching `job_id` within `response[section]["slots"]`.
fn find_slot<'a>(response: &'a Value, section: &str, job_id: &str) -> Option<&'a Value> {
    response
        .get(section)
        .and_then(|section| section.get("slots"))
        .and_then(Value::as_array)
        .and_then(|slots| slots.iter().find(|slot| slot.get("nzo_id").and_then(Value::as_str) == Some(job_id)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_new_rejects_empty_api_key() {
        let result = SabnzbdClient::new("sab", "http://localhost:8080", "");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_submit_returns_nzo_id_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .and(query_param("mode", "addurl"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": true,
                "nzo_ids": ["SABnzbd_nzo_abc123"],
            })))
            .mount(&server)
            .await;

        let client = SabnzbdClient::new("sab", server.uri(), "key").unwrap();
        let job_id = client.submit("https://example.com/wired.nzb", "Wired - Dec2023").await.unwrap();
        assert_eq!(job_id, "SABnzbd_nzo_abc123");
    }

    #[tokio::test]
    async fn test_submit_fails_on_rejected_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": false,
                "error": "bad url",
            })))
            .mount(&server)
            .await;

        let client = SabnzbdClient::new("sab", server.uri(), "key").unwrap();
        let result = client.submit("not-a-url", "Some Title").await;
        assert!(matches!(result, Err(ClientError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_submit_sends_title_as_nzbname() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .and(query_param("mode", "addurl"))
            .and(query_param("nzbname", "Wired - Dec2023"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": true,
                "nzo_ids": ["SABnzbd_nzo_abc123"],
            })))
            .mount(&server)
            .await;

        let client = SabnzbdClient::new("sab", server.uri(), "key").unwrap();
        let job_id = client.submit("https://example.com/wired.nzb", "Wired - Dec2023").await.unwrap();
        assert_eq!(job_id, "SABnzbd_nzo_abc123");
    }

    #[tokio::test]
    async fn test_get_status_downloading_from_queue() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .and(query_param("mode", "queue"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "queue": {
                    "slots": [{"nzo_id": "job1", "status": "Downloading", "percentage": "42"}],
                },
            })))
            .mount(&server)
            .await;

        let client = SabnzbdClient::new("sab", server.uri(), "key").unwrap();
        let status = client.get_status("job1").await.unwrap();
        assert_eq!(status, ClientStatus::Downloading { percentage: Some(42) });
    }

    #[tokio::test]
    async fn test_get_status_completed_from_history() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .and(query_param("mode", "queue"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "queue": {"slots": []},
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .and(query_param("mode", "history"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "history": {
                    "slots": [{"nzo_id": "job1", "status": "Completed", "storage": "/downloads/wired.pdf"}],
                },
            })))
            .mount(&server)
            .await;

        let client = SabnzbdClient::new("sab", server.uri(), "key").unwrap();
        let status = client.get_status("job1").await.unwrap();
        assert_eq!(status, ClientStatus::Completed { file_path: "/downloads/wired.pdf".to_string() });
    }

    #[tokio::test]
    async fn test_get_status_unknown_job_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "queue": {"slots": []},
                "history": {"slots": []},
            })))
            .mount(&server)
            .await;

        let client = SabnzbdClient::new("sab", server.uri(), "key").unwrap();
        let result = client.get_status("ghost").await;
        assert!(matches!(result, Err(ClientError::UnknownJob(_))));
    }

    #[tokio::test]
    async fn test_get_completed_filters_to_completed_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "history": {
                    "slots": [
                        {"nzo_id": "job1", "status": "Completed", "storage": "/downloads/a.pdf"},
                        {"nzo_id": "job2", "status": "Failed", "storage": "/downloads/b.pdf"},
                    ],
                },
            })))
            .mount(&server)
            .await;

        let client = SabnzbdClient::new("sab", server.uri(), "key").unwrap();
        let completed = client.get_completed().await.unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].job_id, "job1");
    }
}
