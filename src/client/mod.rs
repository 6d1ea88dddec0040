//! Download Client capability (§4.12): the external-collaborator seam
//! the Download Orchestrator and Submission Monitor call to submit a
//! URL for download and later learn its outcome. Grounded in the
//! original `SABnzbdClient`'s queue-then-history status lookup.

mod error;
mod sabnzbd;

pub use error::{ClientError, Result};
pub use sabnzbd::SabnzbdClient;

use async_trait::async_trait;

/// The outcome of polling a single submitted job.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientStatus {
    /// Still waiting to start.
    Queued,
    /// In progress, with a 0-100 completion percentage if known.
    Downloading { percentage: Option<u8> },
    /// Finished; `file_path` is where the client placed the completed file.
    Completed { file_path: String },
    /// Terminally failed, with the client's reported reason.
    Failed { message: String },
}

/// A job the client reports as completed, returned in bulk by
/// [`DownloadClient::get_completed`].
#[derive(Debug, Clone)]
pub struct CompletedJob {
    pub job_id: String,
    pub file_path: String,
}

/// Trait every download client backend implements.
///
/// # Object Safety
/// Uses `async_trait` for the same reason as [`crate::search::SearchProvider`].
#[async_trait]
pub trait DownloadClient: Send + Sync {
    /// The client's name, persisted on the submission row (`client_name`).
    fn name(&self) -> &str;

    /// Submits `url` for download under display name `title`, returning
    /// the client's job id (§6.2 `Submit(url, title)`).
    ///
    /// # Errors
    /// Returns [`ClientError::Transport`] or [`ClientError::Rejected`] if
    /// submission fails.
    async fn submit(&self, url: &str, title: &str) -> Result<String>;

    /// Polls the current status of a previously submitted job.
    ///
    /// # Errors
    /// Returns [`ClientError::UnknownJob`] if the client has no record of
    /// `job_id`, or [`ClientError::Transport`] on a communication failure.
    async fn get_status(&self, job_id: &str) -> Result<ClientStatus>;

    /// Returns every job the client currently reports as completed, for
    /// the Submission Monitor's lost-job reconciliation pass (§4.5 step 3).
    ///
    /// # Errors
    /// Returns [`ClientError::Transport`] on a communication failure.
    async fn get_completed(&self) -> Result<Vec<CompletedJob>>;

    /// Deletes a completed job from the client, honoring a tracking
    /// record's `delete_from_client_on_completion` preference (§4.5 step 4).
    ///
    /// # Errors
    /// Returns [`ClientError::Transport`] on a communication failure. A
    /// missing job is not an error (already gone achieves the same end
    /// state).
    async fn delete(&self, job_id: &str) -> Result<()>;
}
