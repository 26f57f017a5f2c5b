use std::sync::Arc;

use anyhow::Context;
use kindling_db::AccountStore;
use kindling_db::models::NewAccount;
use serde::Serialize;
use tracing::{info, warn};

use crate::auth::JwtKeys;
use crate::error::ApiError;

#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: String,
    #[serde(rename = "userId")]
    pub user_id: i64,
}

pub struct RegistrationService {
    accounts: Arc<dyn AccountStore>,
    jwt: JwtKeys,
    require_license_key: bool,
    bcrypt_cost: u32,
}

impl RegistrationService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        jwt: JwtKeys,
        require_license_key: bool,
        bcrypt_cost: u32,
    ) -> Self {
        Self { accounts, jwt, require_license_key, bcrypt_cost }
    }

    /// Hashes the password, then redeems the key and creates the user in one
    /// storage unit. Any failure after redemption leaves the key unused.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        license_key: Option<&str>,
    ) -> Result<AuthSession, ApiError> {
        let email = normalize_email(email)?;
        if password.is_empty() {
            return Err(ApiError::BadRequest("Password is required".to_string()));
        }

        let license_key = license_key.map(str::trim).filter(|k| !k.is_empty());
        if self.require_license_key && license_key.is_none() {
            warn!(email = %email, "Registration attempted without a license key");
            return Err(ApiError::InvalidOrUsedKey);
        }

        let password_hash = hash_password(password.to_string(), self.bcrypt_cost).await?;

        let (user, redeemed) = self
            .accounts
            .register(NewAccount {
                email,
                password_hash,
                license_key: license_key.map(str::to_string),
            })
            .await
            .map_err(ApiError::from_registration)?;

        info!(
            user_id = user.id,
            email = %user.email,
            license_key = redeemed.as_ref().map(|k| k.key.as_str()).unwrap_or("-"),
            "Account created"
        );

        let token = self.jwt.issue(user.id, &user.email)?;
        Ok(AuthSession { token, user_id: user.id })
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, ApiError> {
        let email = normalize_email(email).map_err(|_| ApiError::InvalidCredentials)?;

        let Some(user) = self.accounts.find_by_email(&email).await? else {
            return Err(ApiError::InvalidCredentials);
        };

        let password = password.to_string();
        let hash = user.password_hash.clone();
        let valid = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
            .await
            .context("password verification task failed")
            .map_err(ApiError::Internal)?;

        if !valid {
            info!(email = %email, "Login rejected");
            return Err(ApiError::InvalidCredentials);
        }

        let token = self.jwt.issue(user.id, &user.email)?;
        Ok(AuthSession { token, user_id: user.id })
    }
}

fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::BadRequest("A valid email is required".to_string()));
    }
    Ok(email)
}

async fn hash_password(password: String, cost: u32) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .context("password hashing task failed")
        .map_err(ApiError::Internal)?
        .context("Failed to hash password")
        .map_err(ApiError::Internal)
}
