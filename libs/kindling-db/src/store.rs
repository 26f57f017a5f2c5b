//! Storage contracts. The server only ever sees these traits, so the
//! PostgreSQL repositories and [`crate::MemoryStore`] are interchangeable.

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::models::{
    BreedingRecord, GenerateReport, LedgerStats, LicenseKey, LicenseState, LitterUpdate,
    NewAccount, NewRecord, User,
};
use crate::token;

/// Upper bound on a single generation batch.
pub const MAX_BATCH: usize = 1000;

pub const DEFAULT_BATCH_NOTES: &str = "Batch generated";

/// Authoritative store and transition authority for license-key state.
#[async_trait]
pub trait LicenseLedger: Send + Sync {
    /// Writes each token as an UNUSED key. Every token either lands in
    /// `created` or is reported in `failures`.
    async fn insert_tokens(
        &self,
        tokens: Vec<String>,
        notes: Option<&str>,
    ) -> StoreResult<GenerateReport>;

    /// Atomically moves `key` from UNUSED to USED and binds it to `email`.
    /// A key that is not well-formed is rejected with `InvalidInput`.
    /// Concurrent callers on the same key see exactly one success; the
    /// rest get [`StoreError::AlreadyUsed`].
    async fn try_redeem(&self, key: &str, email: &str) -> StoreResult<LicenseKey>;

    /// Forces REVOKED regardless of prior state and overwrites the notes.
    async fn revoke(&self, key: &str, reason: &str) -> StoreResult<()>;

    async fn find(&self, key: &str) -> StoreResult<Option<LicenseKey>>;

    /// Newest first.
    async fn list_all(&self) -> StoreResult<Vec<LicenseKey>>;

    async fn stats(&self) -> StoreResult<LedgerStats>;

    async fn generate(&self, count: usize, notes: Option<&str>) -> StoreResult<GenerateReport> {
        if count == 0 || count > MAX_BATCH {
            return Err(StoreError::InvalidInput(format!(
                "count must be between 1 and {MAX_BATCH}"
            )));
        }
        let tokens = (0..count).map(|_| token::generate_token()).collect();
        let report = self
            .insert_tokens(tokens, Some(notes.unwrap_or(DEFAULT_BATCH_NOTES)))
            .await?;
        tracing::info!(
            requested = report.requested,
            created = report.created.len(),
            failed = report.failed(),
            "License key batch generated"
        );
        Ok(report)
    }
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Redeems the account's license key (if any) and inserts the user as a
    /// single unit. When the insert fails the key stays UNUSED.
    async fn register(&self, account: NewAccount) -> StoreResult<(User, Option<LicenseKey>)>;

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Ordered by breeding date, most recent first.
    async fn list_for_user(&self, user_id: i64) -> StoreResult<Vec<BreedingRecord>>;

    async fn create(&self, user_id: i64, record: NewRecord) -> StoreResult<BreedingRecord>;

    /// `NotFound` when the record is missing or owned by someone else.
    async fn update_litter(
        &self,
        user_id: i64,
        record_id: i64,
        litter: LitterUpdate,
    ) -> StoreResult<()>;

    async fn delete(&self, user_id: i64, record_id: i64) -> StoreResult<()>;
}

/// Normalizes a caller-supplied token and rejects anything that is not a
/// well-formed key before it reaches storage.
pub(crate) fn checked_token(raw: &str) -> StoreResult<String> {
    let normalized = token::normalize(raw);
    if token::is_well_formed(&normalized) {
        Ok(normalized)
    } else {
        Err(StoreError::InvalidInput(format!("malformed license key: {raw}")))
    }
}

/// Error reported when redeeming a key that is already in `state`.
pub(crate) fn refusal(state: LicenseState) -> StoreError {
    match state {
        LicenseState::Revoked => StoreError::AlreadyRevoked,
        LicenseState::Used | LicenseState::Unused => StoreError::AlreadyUsed,
    }
}
