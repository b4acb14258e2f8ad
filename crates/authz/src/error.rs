//! Authorization errors and their taxonomy

use cosign_core::AddressError;
use cosign_gate::GateError;
use cosign_ledger::LedgerError;
use cosign_pending::PendingError;
use cosign_rules::RuleError;
use serde::Serialize;
use strum_macros::Display;
use thiserror::Error;

/// How a caller should treat an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input; fix the request
    Validation,
    /// Signer, initiator or key not allowed
    Authorization,
    /// Stored state is inconsistent; do not retry
    Integrity,
    /// Ledger trouble; retry with backoff
    Transient,
}

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),

    #[error("Address error: {0}")]
    Address(#[from] AddressError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Gate error: {0}")]
    Gate(#[from] GateError),

    #[error("Pending transaction error: {0}")]
    Pending(#[from] PendingError),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Group '{0}' is reserved for account-level rules")]
    ReservedGroup(String),

    #[error("Corrupt record at {address}: {message}")]
    Corrupt { address: String, message: String },
}

pub type AuthzResult<T> = Result<T, AuthzError>;

impl AuthzError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthzError::Rule(_)
            | AuthzError::InvalidPayload(_)
            | AuthzError::NotFound(_)
            | AuthzError::ReservedGroup(_) => ErrorKind::Validation,
            AuthzError::Address(e) => address_kind(e),
            AuthzError::Ledger(e) => ledger_kind(e),
            AuthzError::Gate(e) => match e {
                GateError::InvalidSignature { .. } | GateError::NotPermitted { .. } => {
                    ErrorKind::Authorization
                }
                GateError::InvalidKey(_) | GateError::Envelope(_) => ErrorKind::Validation,
            },
            AuthzError::Pending(e) => pending_kind(e),
            AuthzError::Corrupt { .. } => ErrorKind::Integrity,
        }
    }
}

fn address_kind(e: &AddressError) -> ErrorKind {
    match e {
        AddressError::Length { .. } => ErrorKind::Integrity,
        AddressError::NotHex(_)
        | AddressError::InvalidRuleHash(_)
        | AddressError::InvalidTransactionId(_) => ErrorKind::Validation,
    }
}

fn ledger_kind(e: &LedgerError) -> ErrorKind {
    match e {
        LedgerError::PartialCommit { .. }
        | LedgerError::Serialization(_)
        | LedgerError::Address(_) => ErrorKind::Integrity,
        LedgerError::Database(_)
        | LedgerError::Rejected(_)
        | LedgerError::CommitTimeout { .. }
        | LedgerError::UnknownReceipt(_)
        | LedgerError::Unavailable(_) => ErrorKind::Transient,
    }
}

fn pending_kind(e: &PendingError) -> ErrorKind {
    match e {
        PendingError::NotFound(_) | PendingError::Expired(_) => ErrorKind::Validation,
        PendingError::NotAuthorizedOrAlreadySigned { .. }
        | PendingError::UnknownKey { .. }
        | PendingError::NotInitiator { .. } => ErrorKind::Authorization,
        PendingError::InvalidSignature { .. }
        | PendingError::Corrupt { .. }
        | PendingError::PartialRecord(_)
        | PendingError::KeyLookup(_) => ErrorKind::Integrity,
        PendingError::Contention { .. } => ErrorKind::Transient,
        PendingError::Ledger(e) => ledger_kind(e),
        PendingError::Address(e) => address_kind(e),
    }
}
