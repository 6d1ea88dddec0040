use thiserror::Error;

/// Errors raised by [`super::CredentialStore`].
#[derive(Error, Debug)]
pub enum CredentialsError {
    /// Credentials have already been set up; this crate supports
    /// exactly one account.
    #[error("credentials already exist")]
    AlreadyExists,

    /// The password hash failed to compute or verify.
    #[error("password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    /// The underlying database query failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, CredentialsError>;
