use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::str::FromStr;

const DEFAULT_JWT_SECRET: &str = "your-secret-key-change-this";
const BCRYPT_COST_RANGE: std::ops::RangeInclusive<u32> = 4..=31;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub database_url: String,
    pub listen_addr: String,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    /// Shared secret for the admin API. Admin routes refuse every request when unset.
    pub admin_key: Option<String>,
    pub require_license_key: bool,
    pub bcrypt_cost: u32,
    pub db_max_connections: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            listen_addr: "0.0.0.0:3000".to_string(),
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            jwt_ttl_hours: 24,
            admin_key: None,
            require_license_key: true,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            db_max_connections: 20,
        }
    }
}

impl ServerConfig {
    pub fn load() -> Result<Self> {
        let config_paths = ["/etc/kindling/kindling.toml", "./kindling.toml"];

        for path in config_paths {
            if let Ok(contents) = fs::read_to_string(path) {
                tracing::info!("Loading config from {}", path);
                let config: Self =
                    toml::from_str(&contents).with_context(|| format!("Invalid config file {path}"))?;
                return config.validated();
            }
        }

        tracing::info!("Loading config from environment");
        Self::from_env()?.validated()
    }

    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let listen_addr = match std::env::var("LISTEN_ADDR") {
            Ok(addr) => addr,
            Err(_) => match std::env::var("PORT") {
                Ok(port) => format!("0.0.0.0:{}", port.trim()),
                Err(_) => defaults.listen_addr,
            },
        };

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").unwrap_or_default(),
            listen_addr,
            jwt_secret: std::env::var("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            jwt_ttl_hours: env_or("JWT_TTL_HOURS", defaults.jwt_ttl_hours)?,
            admin_key: std::env::var("ADMIN_KEY").ok().filter(|k| !k.trim().is_empty()),
            require_license_key: env_or("REQUIRE_LICENSE_KEY", defaults.require_license_key)?,
            bcrypt_cost: env_or("BCRYPT_COST", defaults.bcrypt_cost)?,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
        })
    }

    fn validated(mut self) -> Result<Self> {
        self.admin_key = self.admin_key.filter(|k| !k.trim().is_empty());
        if self.jwt_secret == DEFAULT_JWT_SECRET {
            tracing::warn!("JWT_SECRET is not set; using the built-in development secret");
        }
        if self.admin_key.is_none() {
            tracing::warn!("ADMIN_KEY is not set; admin license endpoints are disabled");
        }
        if !BCRYPT_COST_RANGE.contains(&self.bcrypt_cost) {
            anyhow::bail!(
                "BCRYPT_COST must be between {} and {}",
                BCRYPT_COST_RANGE.start(),
                BCRYPT_COST_RANGE.end()
            );
        }
        if self.jwt_ttl_hours <= 0 {
            anyhow::bail!("JWT_TTL_HOURS must be positive");
        }
        Ok(self)
    }
}

fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}
