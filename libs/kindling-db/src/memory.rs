//! In-memory implementation of every store contract, used by tests and local
//! runs without PostgreSQL. One async mutex guards the whole state so each
//! operation is atomic the same way a single SQL statement or transaction is.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::models::{
    BreedingRecord, FailureReason, GenerateReport, KeyFailure, LedgerStats, LicenseKey,
    LicenseState, LitterUpdate, NewAccount, NewRecord, User,
};
use crate::store::{AccountStore, LicenseLedger, RecordStore, checked_token, refusal};
use crate::token;

#[derive(Debug, Default)]
struct State {
    keys: HashMap<String, LicenseKey>,
    users: HashMap<String, User>,
    records: Vec<BreedingRecord>,
    next_key_id: i64,
    next_user_id: i64,
    next_record_id: i64,
}

impl State {
    fn redeem(&mut self, key: &str, email: &str) -> StoreResult<LicenseKey> {
        let license = self.keys.get_mut(&checked_token(key)?).ok_or(StoreError::NotFound)?;
        if license.state.is_terminal() {
            return Err(refusal(license.state));
        }
        license.state = LicenseState::Used;
        license.bound_email = Some(email.to_string());
        license.used_at = Some(Utc::now());
        Ok(license.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LicenseLedger for MemoryStore {
    async fn insert_tokens(
        &self,
        tokens: Vec<String>,
        notes: Option<&str>,
    ) -> StoreResult<GenerateReport> {
        let mut state = self.state.lock().await;
        let mut report = GenerateReport::new(tokens.len());

        for raw in tokens {
            let token = match checked_token(&raw) {
                Ok(token) => token,
                Err(_) => {
                    report.failures.push(KeyFailure {
                        token: raw,
                        reason: FailureReason::Malformed,
                    });
                    continue;
                }
            };
            if state.keys.contains_key(&token) {
                report.failures.push(KeyFailure {
                    token,
                    reason: FailureReason::DuplicateToken,
                });
                continue;
            }

            state.next_key_id += 1;
            let license = LicenseKey {
                id: state.next_key_id,
                key: token.clone(),
                state: LicenseState::Unused,
                bound_email: None,
                used_at: None,
                notes: notes.map(str::to_string),
                created_at: Utc::now(),
            };
            state.keys.insert(token, license.clone());
            report.created.push(license);
        }

        Ok(report)
    }

    async fn try_redeem(&self, key: &str, email: &str) -> StoreResult<LicenseKey> {
        self.state.lock().await.redeem(key, email)
    }

    async fn revoke(&self, key: &str, reason: &str) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let license = state.keys.get_mut(&token::normalize(key)).ok_or(StoreError::NotFound)?;
        license.state = LicenseState::Revoked;
        license.notes = Some(reason.to_string());
        Ok(())
    }

    async fn find(&self, key: &str) -> StoreResult<Option<LicenseKey>> {
        Ok(self.state.lock().await.keys.get(&token::normalize(key)).cloned())
    }

    async fn list_all(&self) -> StoreResult<Vec<LicenseKey>> {
        let mut keys: Vec<LicenseKey> = self.state.lock().await.keys.values().cloned().collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(keys)
    }

    async fn stats(&self) -> StoreResult<LedgerStats> {
        let state = self.state.lock().await;
        let mut stats = LedgerStats::default();
        for license in state.keys.values() {
            stats.total_keys += 1;
            match license.state {
                LicenseState::Unused => stats.unused_keys += 1,
                LicenseState::Used => stats.used_keys += 1,
                LicenseState::Revoked => stats.revoked_keys += 1,
            }
        }
        Ok(stats)
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn register(&self, account: NewAccount) -> StoreResult<(User, Option<LicenseKey>)> {
        let mut state = self.state.lock().await;

        // Checked before redeeming so a taken email never consumes the key.
        if state.users.contains_key(&account.email) {
            return Err(StoreError::Conflict(format!(
                "email already registered: {}",
                account.email
            )));
        }

        let redeemed = match account.license_key.as_deref() {
            Some(key) => Some(state.redeem(key, &account.email)?),
            None => None,
        };

        state.next_user_id += 1;
        let user = User {
            id: state.next_user_id,
            email: account.email.clone(),
            password_hash: account.password_hash,
            license_key: redeemed.as_ref().map(|license| license.key.clone()),
            created_at: Utc::now(),
        };
        state.users.insert(account.email, user.clone());
        Ok((user, redeemed))
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.state.lock().await.users.get(email).cloned())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list_for_user(&self, user_id: i64) -> StoreResult<Vec<BreedingRecord>> {
        let state = self.state.lock().await;
        let mut records: Vec<BreedingRecord> =
            state.records.iter().filter(|r| r.user_id == user_id).cloned().collect();
        records.sort_by(|a, b| b.breeding_date.cmp(&a.breeding_date).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    async fn create(&self, user_id: i64, record: NewRecord) -> StoreResult<BreedingRecord> {
        let mut state = self.state.lock().await;
        state.next_record_id += 1;
        let created = BreedingRecord {
            id: state.next_record_id,
            user_id,
            breeding_date: record.breeding_date,
            doe_name: record.doe_name,
            buck_name: record.buck_name,
            notes: record.notes,
            litter_size: record.litter_size,
            male_count: record.male_count,
            female_count: record.female_count,
            created_at: Utc::now(),
        };
        state.records.push(created.clone());
        Ok(created)
    }

    async fn update_litter(
        &self,
        user_id: i64,
        record_id: i64,
        litter: LitterUpdate,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let record = state
            .records
            .iter_mut()
            .find(|r| r.id == record_id && r.user_id == user_id)
            .ok_or(StoreError::NotFound)?;
        record.litter_size = litter.litter_size;
        record.male_count = litter.male_count;
        record.female_count = litter.female_count;
        Ok(())
    }

    async fn delete(&self, user_id: i64, record_id: i64) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let before = state.records.len();
        state.records.retain(|r| !(r.id == record_id && r.user_id == user_id));
        if state.records.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn account(email: &str, key: Option<&str>) -> NewAccount {
        NewAccount {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            license_key: key.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn generate_then_redeem_once() {
        let store = MemoryStore::new();
        let report = store.generate(3, Some("batch A")).await.unwrap();
        assert_eq!(report.requested, 3);
        assert_eq!(report.created.len(), 3);
        assert!(report.failures.is_empty());

        let first = &report.created[0];
        assert!(report.created.iter().all(|k| k.state == LicenseState::Unused));
        assert!(report.created.iter().all(|k| k.notes.as_deref() == Some("batch A")));

        let redeemed = store.try_redeem(&first.key, "a@x.com").await.unwrap();
        assert_eq!(redeemed.state, LicenseState::Used);
        assert_eq!(redeemed.bound_email.as_deref(), Some("a@x.com"));
        assert!(redeemed.used_at.is_some());

        let again = store.try_redeem(&first.key, "a@x.com").await;
        assert!(matches!(again, Err(StoreError::AlreadyUsed)));

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_keys, 3);
        assert_eq!(stats.used_keys, 1);
        assert_eq!(stats.unused_keys, 2);
    }

    #[tokio::test]
    async fn generate_rejects_empty_and_oversized_batches() {
        let store = MemoryStore::new();
        assert!(matches!(store.generate(0, None).await, Err(StoreError::InvalidInput(_))));
        assert!(matches!(
            store.generate(crate::store::MAX_BATCH + 1, None).await,
            Err(StoreError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn generate_uses_default_notes() {
        let store = MemoryStore::new();
        let report = store.generate(1, None).await.unwrap();
        assert_eq!(
            report.created[0].notes.as_deref(),
            Some(crate::store::DEFAULT_BATCH_NOTES)
        );
    }

    #[tokio::test]
    async fn colliding_tokens_are_reported_not_dropped() {
        let store = MemoryStore::new();
        store.insert_tokens(vec!["AAAA-BBBB-CCCC-DDDD".into()], None).await.unwrap();

        let report = store
            .insert_tokens(
                vec![
                    "AAAA-BBBB-CCCC-DDDD".into(),
                    "EEEE-FFFF-GGGG-HHHH".into(),
                    "eeee-ffff-gggg-hhhh".into(),
                    "not-a-key".into(),
                ],
                Some("dupes"),
            )
            .await
            .unwrap();

        assert_eq!(report.requested, 4);
        assert_eq!(report.created.len(), 1);
        assert_eq!(report.failed(), 3);
        assert_eq!(report.created.len() + report.failed(), report.requested);
        assert_eq!(report.failures[0].token, "AAAA-BBBB-CCCC-DDDD");
        assert_eq!(report.failures[0].reason, FailureReason::DuplicateToken);
        assert_eq!(report.failures[2].reason, FailureReason::Malformed);
        assert_eq!(store.stats().await.unwrap().total_keys, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_redemptions_have_one_winner() {
        let store = MemoryStore::new();
        let key = store.generate(1, None).await.unwrap().created[0].key.clone();

        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                store.try_redeem(&key, &format!("user{i}@x.com")).await
            }));
        }

        let mut wins = 0;
        let mut already_used = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(StoreError::AlreadyUsed) => already_used += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(already_used, 31);
    }

    #[tokio::test]
    async fn unknown_and_revoked_keys_are_never_redeemable() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.try_redeem("ZZZZ-ZZZZ-ZZZZ-ZZZZ", "a@x.com").await,
            Err(StoreError::NotFound)
        ));

        let key = store.generate(1, None).await.unwrap().created[0].key.clone();
        store.revoke(&key, "chargeback").await.unwrap();
        assert!(matches!(store.try_redeem(&key, "a@x.com").await, Err(StoreError::AlreadyRevoked)));
    }

    #[tokio::test]
    async fn malformed_key_is_invalid_input() {
        let store = MemoryStore::new();
        store.generate(1, None).await.unwrap();
        for raw in ["", "not-a-key", "AAAA-BBBB-CCCC", "AAAA-BBBB-CCCC-DDD!"] {
            assert!(matches!(
                store.try_redeem(raw, "a@x.com").await,
                Err(StoreError::InvalidInput(_))
            ));
        }
        assert!(matches!(
            store.register(account("a@x.com", Some("not-a-key"))).await,
            Err(StoreError::InvalidInput(_))
        ));
        assert!(store.find_by_email("a@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn revoke_keeps_binding_and_is_idempotent() {
        let store = MemoryStore::new();
        let key = store.generate(1, None).await.unwrap().created[0].key.clone();
        let used = store.try_redeem(&key, "a@x.com").await.unwrap();

        store.revoke(&key, "refund").await.unwrap();
        store.revoke(&key, "refund again").await.unwrap();

        let revoked = store.find(&key).await.unwrap().unwrap();
        assert_eq!(revoked.state, LicenseState::Revoked);
        assert_eq!(revoked.bound_email.as_deref(), Some("a@x.com"));
        assert_eq!(revoked.used_at, used.used_at);
        assert_eq!(revoked.notes.as_deref(), Some("refund again"));

        assert!(matches!(store.revoke("ZZZZ-ZZZZ-ZZZZ-ZZZZ", "x").await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn redemption_accepts_lowercase_input() {
        let store = MemoryStore::new();
        let key = store.generate(1, None).await.unwrap().created[0].key.clone();
        let redeemed = store.try_redeem(&format!(" {} ", key.to_lowercase()), "a@x.com").await.unwrap();
        assert_eq!(redeemed.key, key);
    }

    #[tokio::test]
    async fn list_all_is_newest_first() {
        let store = MemoryStore::new();
        let first = store.generate(1, None).await.unwrap().created[0].id;
        let second = store.generate(1, None).await.unwrap().created[0].id;
        let ids: Vec<i64> = store.list_all().await.unwrap().iter().map(|k| k.id).collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[tokio::test]
    async fn taken_email_does_not_consume_key() {
        let store = MemoryStore::new();
        let keys = store.generate(2, None).await.unwrap().created;
        store.register(account("a@x.com", Some(keys[0].key.as_str()))).await.unwrap();

        let dup = store.register(account("a@x.com", Some(keys[1].key.as_str()))).await;
        assert!(matches!(dup, Err(StoreError::Conflict(_))));
        let untouched = store.find(&keys[1].key).await.unwrap().unwrap();
        assert_eq!(untouched.state, LicenseState::Unused);
        assert!(untouched.bound_email.is_none());
    }

    #[tokio::test]
    async fn registration_binds_user_to_key() {
        let store = MemoryStore::new();
        let key = store.generate(1, None).await.unwrap().created[0].key.clone();
        let (user, redeemed) = store.register(account("b@x.com", Some(key.as_str()))).await.unwrap();
        assert_eq!(user.license_key.as_deref(), Some(key.as_str()));
        assert_eq!(redeemed.unwrap().bound_email.as_deref(), Some("b@x.com"));

        let again = store.register(account("c@x.com", Some(key.as_str()))).await;
        assert!(matches!(again, Err(StoreError::AlreadyUsed)));
        assert!(store.find_by_email("c@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn records_are_scoped_to_their_owner() {
        let store = MemoryStore::new();
        let record = NewRecord {
            breeding_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            doe_name: "Clover".into(),
            buck_name: Some("Thumper".into()),
            notes: None,
            litter_size: None,
            male_count: None,
            female_count: None,
        };
        let created = store.create(1, record).await.unwrap();

        assert!(store.list_for_user(2).await.unwrap().is_empty());
        let litter = LitterUpdate { litter_size: Some(7), male_count: Some(3), female_count: Some(4) };
        assert!(matches!(store.update_litter(2, created.id, litter).await, Err(StoreError::NotFound)));
        assert!(matches!(store.delete(2, created.id).await, Err(StoreError::NotFound)));

        store.update_litter(1, created.id, litter).await.unwrap();
        let listed = store.list_for_user(1).await.unwrap();
        assert_eq!(listed[0].litter_size, Some(7));

        store.delete(1, created.id).await.unwrap();
        assert!(store.list_for_user(1).await.unwrap().is_empty());
    }
}
