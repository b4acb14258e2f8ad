//! Ledger errors

use cosign_core::AddressError;
use thiserror::Error;

use crate::batch::RejectReason;

/// Errors that can occur while reading from or committing to the ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid stored address: {0}")]
    Address(#[from] AddressError),

    #[error("Batch rejected: {0}")]
    Rejected(RejectReason),

    #[error("Commit not confirmed after {waited_ms}ms (receipt {receipt})")]
    CommitTimeout { receipt: String, waited_ms: u64 },

    #[error("Partial commit: expected {expected} addresses, ledger confirmed {committed}")]
    PartialCommit { expected: usize, committed: usize },

    #[error("Unknown receipt: {0}")]
    UnknownReceipt(String),

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

impl LedgerError {
    /// Another writer changed a key this batch depended on
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            LedgerError::Rejected(RejectReason::VersionConflict { .. })
        )
    }

    /// A key the batch expected to exist (or delete) was missing
    pub fn is_missing_key(&self) -> bool {
        matches!(self, LedgerError::Rejected(RejectReason::MissingKey { .. }))
    }

    /// Worth retrying with backoff
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LedgerError::Database(_)
                | LedgerError::CommitTimeout { .. }
                | LedgerError::Unavailable(_)
        ) || self.is_conflict()
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
