use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;

use crate::error::{StoreError, StoreResult, unique_violation};
use crate::models::{LicenseKey, NewAccount, User};
use crate::repositories::license_repo::redeem_in;
use crate::store::AccountStore;

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for UserRepository {
    async fn register(&self, account: NewAccount) -> StoreResult<(User, Option<LicenseKey>)> {
        let mut tx = self.pool.begin().await?;

        let redeemed = match account.license_key.as_deref() {
            Some(key) => Some(redeem_in(&mut tx, key, &account.email).await?),
            None => None,
        };

        // A failed insert drops `tx`, which rolls the redemption back.
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, license_key)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash, license_key, created_at
            "#,
        )
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(redeemed.as_ref().map(|license| license.key.as_str()))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(_) => StoreError::Conflict(format!("email already registered: {}", account.email)),
            None => StoreError::StorageUnavailable(e),
        })?;

        tx.commit().await?;

        info!(user_id = user.id, email = %user.email, "User registered");
        Ok((user, redeemed))
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, license_key, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}
