use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "license_state", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LicenseState {
    Unused,
    Used,
    Revoked,
}

impl LicenseState {
    /// USED and REVOKED keys can never be redeemed again.
    pub fn is_terminal(self) -> bool {
        !matches!(self, LicenseState::Unused)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LicenseKey {
    pub id: i64,
    pub key: String,
    pub state: LicenseState,
    pub bound_email: Option<String>,
    pub used_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Why a token in a generation batch was not written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    #[error("malformed license key")]
    Malformed,
    #[error("license key token already exists")]
    DuplicateToken,
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

/// A token that could not be written during a generation batch.
#[derive(Debug, Clone, Serialize)]
pub struct KeyFailure {
    pub token: String,
    pub reason: FailureReason,
}

/// Outcome of a generation batch. Partial success is a normal result.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateReport {
    pub requested: usize,
    pub created: Vec<LicenseKey>,
    pub failures: Vec<KeyFailure>,
}

impl GenerateReport {
    pub fn new(requested: usize) -> Self {
        Self {
            requested,
            created: Vec::with_capacity(requested),
            failures: Vec::new(),
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LedgerStats {
    pub total_keys: i64,
    pub used_keys: i64,
    pub revoked_keys: i64,
    pub unused_keys: i64,
}
