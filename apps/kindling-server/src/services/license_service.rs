use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use kindling_db::models::{GenerateReport, LedgerStats, LicenseKey};
use kindling_db::store::DEFAULT_BATCH_NOTES;
use kindling_db::{LicenseLedger, StoreResult};
use tracing::info;

/// Administrative operations over the license ledger, shared by the admin
/// API and the `keys` CLI.
#[derive(Clone)]
pub struct LicenseService {
    ledger: Arc<dyn LicenseLedger>,
}

impl LicenseService {
    pub fn new(ledger: Arc<dyn LicenseLedger>) -> Self {
        Self { ledger }
    }

    pub async fn generate(&self, count: usize, notes: Option<&str>) -> StoreResult<GenerateReport> {
        let notes = notes.map(str::trim).filter(|n| !n.is_empty());
        self.ledger.generate(count, notes).await
    }

    pub async fn list_all(&self) -> StoreResult<Vec<LicenseKey>> {
        self.ledger.list_all().await
    }

    pub async fn find(&self, key: &str) -> StoreResult<Option<LicenseKey>> {
        self.ledger.find(key).await
    }

    pub async fn revoke(&self, key: &str, reason: &str) -> StoreResult<()> {
        self.ledger.revoke(key, reason).await?;
        info!(key, reason, "License key revoked by administrator");
        Ok(())
    }

    pub async fn stats(&self) -> StoreResult<LedgerStats> {
        self.ledger.stats().await
    }
}

/// Writes the created keys of a batch to `license-keys-<millis>.txt` in `dir`.
/// Returns `None` when the batch created nothing.
pub fn export_batch(report: &GenerateReport, notes: Option<&str>, dir: &Path) -> Result<Option<PathBuf>> {
    if report.created.is_empty() {
        return Ok(None);
    }

    let now = Utc::now();
    let path = dir.join(format!("license-keys-{}.txt", now.timestamp_millis()));
    let keys: Vec<&str> = report.created.iter().map(|k| k.key.as_str()).collect();
    let content = format!(
        "License Keys Generated on {}\nNotes: {}\n=====================================\n\n{}\n",
        now.to_rfc3339(),
        notes.unwrap_or(DEFAULT_BATCH_NOTES),
        keys.join("\n")
    );

    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write license keys to {}", path.display()))?;
    info!(path = %path.display(), count = keys.len(), "License keys exported");
    Ok(Some(path))
}
