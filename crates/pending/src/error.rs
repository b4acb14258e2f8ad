//! Pending-transaction errors

use cosign_core::AddressError;
use cosign_ledger::LedgerError;
use thiserror::Error;

/// Errors from the pending-transaction state machine
#[derive(Debug, Error)]
pub enum PendingError {
    #[error("Pending transaction not found: {0}")]
    NotFound(String),

    #[error("{initiator} is not a pending signer of {transaction_id} (not listed or already signed)")]
    NotAuthorizedOrAlreadySigned {
        initiator: String,
        transaction_id: String,
    },

    #[error("Public key is not registered for initiator {initiator}")]
    UnknownKey { initiator: String },

    #[error("{caller} did not initiate pending transaction {transaction_id}")]
    NotInitiator {
        caller: String,
        transaction_id: String,
    },

    #[error("Signature does not verify against the body of {transaction_id}")]
    InvalidSignature { transaction_id: String },

    #[error("Pending transaction has expired: {0}")]
    Expired(String),

    #[error("Corrupt record at {address}: {message}")]
    Corrupt { address: String, message: String },

    #[error("Pending transaction {0} is only partially present")]
    PartialRecord(String),

    #[error("Gave up on {transaction_id} after {attempts} conflicting updates")]
    Contention {
        transaction_id: String,
        attempts: u32,
    },

    #[error("Key lookup failed: {0}")]
    KeyLookup(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Address error: {0}")]
    Address(#[from] AddressError),
}

pub type PendingResult<T> = Result<T, PendingError>;
