use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};

use crate::error::{StoreError, StoreResult, unique_violation};
use crate::models::{FailureReason, GenerateReport, KeyFailure, LedgerStats, LicenseKey, LicenseState};
use crate::store::{LicenseLedger, checked_token, refusal};
use crate::token;

#[derive(Clone, Debug)]
pub struct LicenseRepository {
    pool: PgPool,
}

impl LicenseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Redeems `key` on an existing connection so registration can run it inside
/// its own transaction. The state check and the write are one statement;
/// Postgres row locking makes a concurrent loser re-evaluate the predicate
/// and match zero rows.
pub(crate) async fn redeem_in(
    conn: &mut PgConnection,
    key: &str,
    email: &str,
) -> StoreResult<LicenseKey> {
    let key = checked_token(key)?;

    let redeemed = sqlx::query_as::<_, LicenseKey>(
        r#"
        UPDATE license_keys
        SET state = 'used', bound_email = $2, used_at = NOW()
        WHERE key = $1 AND state = 'unused'
        RETURNING id, key, state, bound_email, used_at, notes, created_at
        "#,
    )
    .bind(&key)
    .bind(email)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(license) = redeemed {
        info!(key = %license.key, email, "License key redeemed");
        return Ok(license);
    }

    // Zero rows: only the reason is left to report.
    let state: Option<LicenseState> =
        sqlx::query_scalar("SELECT state FROM license_keys WHERE key = $1")
            .bind(&key)
            .fetch_optional(&mut *conn)
            .await?;

    let err = state.map_or(StoreError::NotFound, refusal);
    warn!(key = %key, email, error = %err, "License key redemption refused");
    Err(err)
}

#[async_trait]
impl LicenseLedger for LicenseRepository {
    async fn insert_tokens(
        &self,
        tokens: Vec<String>,
        notes: Option<&str>,
    ) -> StoreResult<GenerateReport> {
        let mut report = GenerateReport::new(tokens.len());
        let mut pending = tokens.into_iter();

        while let Some(raw) = pending.next() {
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

            let inserted = sqlx::query_as::<_, LicenseKey>(
                r#"
                INSERT INTO license_keys (key, notes)
                VALUES ($1, $2)
                RETURNING id, key, state, bound_email, used_at, notes, created_at
                "#,
            )
            .bind(&token)
            .bind(notes)
            .fetch_one(&self.pool)
            .await;

            match inserted {
                Ok(license) => report.created.push(license),
                Err(e) if unique_violation(&e).is_some() => {
                    warn!(token = %token, "Generated license key collided with an existing key");
                    report.failures.push(KeyFailure {
                        token,
                        reason: FailureReason::DuplicateToken,
                    });
                }
                Err(e) => {
                    // Nothing written yet: surface the storage failure as is.
                    if report.created.is_empty() {
                        return Err(StoreError::StorageUnavailable(e));
                    }
                    // Otherwise keep what exists and account for every token left.
                    warn!(error = %e, "Aborting license key batch after partial success");
                    let reason = FailureReason::StorageUnavailable(e.to_string());
                    report.failures.push(KeyFailure { token, reason: reason.clone() });
                    report.failures.extend(
                        pending.by_ref().map(|token| KeyFailure { token, reason: reason.clone() }),
                    );
                }
            }
        }

        Ok(report)
    }

    async fn try_redeem(&self, key: &str, email: &str) -> StoreResult<LicenseKey> {
        let mut conn = self.pool.acquire().await?;
        redeem_in(&mut conn, key, email).await
    }

    async fn revoke(&self, key: &str, reason: &str) -> StoreResult<()> {
        let key = token::normalize(key);
        let result = sqlx::query(
            "UPDATE license_keys SET state = 'revoked', notes = $2 WHERE key = $1",
        )
        .bind(&key)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        info!(key = %key, reason, "License key revoked");
        Ok(())
    }

    async fn find(&self, key: &str) -> StoreResult<Option<LicenseKey>> {
        let license = sqlx::query_as::<_, LicenseKey>(
            r#"
            SELECT id, key, state, bound_email, used_at, notes, created_at
            FROM license_keys
            WHERE key = $1
            "#,
        )
        .bind(token::normalize(key))
        .fetch_optional(&self.pool)
        .await?;
        Ok(license)
    }

    async fn list_all(&self) -> StoreResult<Vec<LicenseKey>> {
        let keys = sqlx::query_as::<_, LicenseKey>(
            r#"
            SELECT id, key, state, bound_email, used_at, notes, created_at
            FROM license_keys
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(keys)
    }

    async fn stats(&self) -> StoreResult<LedgerStats> {
        let stats = sqlx::query_as::<_, LedgerStats>(
            r#"
            SELECT
                COUNT(*) AS total_keys,
                COUNT(*) FILTER (WHERE state = 'used') AS used_keys,
                COUNT(*) FILTER (WHERE state = 'revoked') AS revoked_keys,
                COUNT(*) FILTER (WHERE state = 'unused') AS unused_keys
            FROM license_keys
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }
}
