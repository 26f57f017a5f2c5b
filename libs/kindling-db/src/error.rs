//! Error taxonomy shared by every storage backend.

use thiserror::Error;

/// Errors raised by the ledger, account and record stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key, user or record does not exist.
    #[error("not found")]
    NotFound,

    /// The license key was already redeemed.
    #[error("license key has already been used")]
    AlreadyUsed,

    /// The license key was revoked by an administrator.
    #[error("license key has been revoked")]
    AlreadyRevoked,

    /// A unique constraint other than the token was violated (email taken).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The request was rejected before reaching storage.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Transport or transaction failure. Never retried at this layer.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] sqlx::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Name of the violated constraint when `err` is a unique violation.
pub(crate) fn unique_violation(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Some(db.constraint().unwrap_or_default())
        }
        _ => None,
    }
}
