//! Credential store (§6.5): a single-row username/password with a
//! process-local session token. Deliberately trivial compared to the
//! reference implementation's JWT-based `AuthManager` — no signing
//! key, no refresh, the token simply lives in memory for its
//! lifetime and is forgotten on restart, per SPEC_FULL.md's decision
//! to scope this crate's auth surface down to what §6.5 names.

mod error;

pub use error::{CredentialsError, Result};

use chrono::{DateTime, Utc};
use rand::RngCore;
use sqlx::sqlite::SqlitePool;
use tracing::instrument;

const SESSION_TTL_HOURS: i64 = 24;

/// An issued, unexpired session token.
#[derive(Debug, Clone)]
pub struct SessionToken {
    pub token: String,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

/// Manages the single-row `credentials` table and an in-memory
/// session token. Not `Clone`: the active token is owned state, and
/// cloning it would let two handles disagree about whether a session
/// is still live.
pub struct CredentialStore {
    db: SqlitePool,
    active_token: std::sync::Mutex<Option<SessionToken>>,
}

impl CredentialStore {
    #[must_use]
    pub fn new(db: SqlitePool) -> Self {
        Self { db, active_token: std::sync::Mutex::new(None) }
    }

    /// Returns `true` if credentials have already been set up.
    #[instrument(skip(self))]
    pub async fn credentials_exist(&self) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM credentials WHERE id = 1")
            .fetch_optional(&self.db)
            .await?;
        Ok(row.is_some())
    }

    /// Sets the initial username and password. Fails if credentials
    /// already exist — this crate has exactly one account.
    #[instrument(skip(self, password))]
    pub async fn set_password(&self, username: &str, password: &str) -> Result<()> {
        if self.credentials_exist().await? {
            return Err(CredentialsError::AlreadyExists);
        }

        let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;
        sqlx::query(
            "INSERT INTO credentials (id, username, password_hash) VALUES (1, ?, ?)",
        )
        .bind(username)
        .bind(hash)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Verifies `username`/`password` against the stored credentials.
    #[instrument(skip(self, password))]
    pub async fn verify_password(&self, username: &str, password: &str) -> Result<bool> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT username, password_hash FROM credentials WHERE id = 1")
                .fetch_optional(&self.db)
                .await?;

        let Some((stored_username, password_hash)) = row else {
            return Ok(false);
        };

        if stored_username != username {
            return Ok(false);
        }

        Ok(bcrypt::verify(password, &password_hash)?)
    }

    /// Issues a fresh session token, replacing any previously active
    /// one. The token is a random 32-byte value, hex-encoded, and is
    /// held only in process memory with a 24-hour expiry.
    #[instrument(skip(self))]
    pub fn issue_token(&self, username: &str) -> SessionToken {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = bytes.iter().map(|b| format!("{b:02x}")).collect::<String>();
        let session = SessionToken {
            token,
            username: username.to_string(),
            expires_at: Utc::now() + chrono::Duration::hours(SESSION_TTL_HOURS),
        };

        let mut guard = self.lock_token();
        *guard = Some(session.clone());
        session
    }

    /// Checks whether `token` matches the currently active,
    /// unexpired session token. Returns the associated username.
    #[instrument(skip(self, token))]
    pub fn verify_token(&self, token: &str) -> Option<String> {
        let guard = self.lock_token();
        let session = guard.as_ref()?;

        if session.token != token {
            return None;
        }
        if session.expires_at < Utc::now() {
            return None;
        }

        Some(session.username.clone())
    }

    /// Invalidates the currently active session token, if any.
    #[instrument(skip(self))]
    pub fn revoke_token(&self) {
        let mut guard = self.lock_token();
        *guard = None;
    }

    fn lock_token(&self) -> std::sync::MutexGuard<'_, Option<SessionToken>> {
        self.active_token.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_set_password_then_verify_succeeds() {
        let store = CredentialStore::new(test_pool().await);
        store.set_password("admin", "hunter2").await.unwrap();

        assert!(store.verify_password("admin", "hunter2").await.unwrap());
        assert!(!store.verify_password("admin", "wrong").await.unwrap());
        assert!(!store.verify_password("nobody", "hunter2").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_password_twice_fails() {
        let store = CredentialStore::new(test_pool().await);
        store.set_password("admin", "hunter2").await.unwrap();

        let result = store.set_password("admin", "other").await;
        assert!(matches!(result, Err(CredentialsError::AlreadyExists)));
    }

    #[tokio::test]
    async fn test_issue_and_verify_token_roundtrip() {
        let store = CredentialStore::new(test_pool().await);
        store.set_password("admin", "hunter2").await.unwrap();

        let session = store.issue_token("admin");
        assert_eq!(store.verify_token(&session.token), Some("admin".to_string()));
        assert_eq!(store.verify_token("not-the-token"), None);
    }

    #[tokio::test]
    async fn test_revoke_token_invalidates_session() {
        let store = CredentialStore::new(test_pool().await);
        let session = store.issue_token("admin");
        store.revoke_token();

        assert_eq!(store.verify_token(&session.token), None);
    }

    #[tokio::test]
    async fn test_issuing_new_token_invalidates_previous() {
        let store = CredentialStore::new(test_pool().await);
        let first = store.issue_token("admin");
        let second = store.issue_token("admin");

        assert_eq!(store.verify_token(&first.token), None);
        assert_eq!(store.verify_token(&second.token), Some("admin".to_string()));
    }
}
