//! Gate errors

use thiserror::Error;

/// Errors raised by the permission gate
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Invalid envelope signature from {signer}")]
    InvalidSignature { signer: String },

    #[error("Signer {signer} is not permitted to write to family '{family}'")]
    NotPermitted { family: String, signer: String },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Malformed envelope: {0}")]
    Envelope(#[from] serde_json::Error),
}

pub type GateResult<T> = Result<T, GateError>;
