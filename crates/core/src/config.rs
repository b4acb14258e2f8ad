//! Engine configuration
//!
//! Every field has a default so a partial JSON file is enough.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::address::ACCOUNT_LEVEL_GROUP;

/// Signature algorithm used for envelopes and pending-transaction signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SignatureAlgorithm {
    /// Ed25519
    Ed25519,
    /// ECDSA over secp256k1, compressed SEC1 public keys
    #[default]
    Secp256k1,
}

/// Configuration for the authorization engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Reserved group whose rules apply to every initiator of an account
    #[serde(default = "default_account_level_group")]
    pub account_level_group: String,

    #[serde(default)]
    pub signature_algorithm: SignatureAlgorithm,

    // === Ledger commits ===
    /// Maximum wait for a commit confirmation
    #[serde(default = "default_commit_timeout_ms")]
    pub commit_timeout_ms: u64,

    /// Delay between commit polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Optimistic-concurrency retries for signature accrual
    #[serde(default = "default_max_cas_retries")]
    pub max_cas_retries: u32,

    // === Pending transactions ===
    /// Hours until a pending transaction expires; `None` keeps it until settled or cancelled
    #[serde(default)]
    pub pending_ttl_hours: Option<u64>,
}

fn default_account_level_group() -> String {
    ACCOUNT_LEVEL_GROUP.to_string()
}

fn default_commit_timeout_ms() -> u64 {
    30_000
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_max_cas_retries() -> u32 {
    16
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            account_level_group: default_account_level_group(),
            signature_algorithm: SignatureAlgorithm::default(),
            commit_timeout_ms: default_commit_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            max_cas_retries: default_max_cas_retries(),
            pending_ttl_hours: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from JSON file
    pub fn from_file(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    pub fn with_algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.signature_algorithm = algorithm;
        self
    }

    pub fn with_pending_ttl_hours(mut self, hours: u64) -> Self {
        self.pending_ttl_hours = Some(hours);
        self
    }

    /// Get commit timeout as Duration
    pub fn commit_timeout(&self) -> Duration {
        Duration::from_millis(self.commit_timeout_ms)
    }

    /// Get poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Get pending expiry as chrono Duration
    pub fn pending_ttl(&self) -> Option<chrono::Duration> {
        self.pending_ttl_hours
            .map(|hours| chrono::Duration::hours(hours as i64))
    }
}
