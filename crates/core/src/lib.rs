//! Cosign Core - shared building blocks
//!
//! This crate contains the pieces every other Cosign crate agrees on:
//! - `Address`: fixed-length ledger keys and the namespace builders that derive them
//! - `RequestKind`: the closed set of request-type tags carried by signed envelopes
//! - `EngineConfig`: timeouts, retry limits and the signature algorithm in use

pub mod address;
pub mod config;
pub mod hash;
pub mod kind;

pub use address::{
    family_name, rule_hash, rule_hash_from_address, validate_rule_hash, validate_transaction_id, Address,
    AddressError, Namespace, Prefix, Subspace, ACCOUNT_LEVEL_GROUP, ADDRESS_LENGTH,
    PERMISSION_TAG, RULE_HASH_LENGTH, TRANSACTION_ID_LENGTH,
};
pub use config::{EngineConfig, SignatureAlgorithm};
pub use kind::RequestKind;
