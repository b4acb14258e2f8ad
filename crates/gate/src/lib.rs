//! Cosign Gate - signatures and signer permissions
//!
//! Nothing reaches the ledger without passing through here:
//! - `verify_signature`: detached Ed25519 / secp256k1 signatures, hex-encoded
//! - `PermissionGate`: signature check plus a `PermissionRegistry` lookup for mutations
//! - `SignedEnvelope`: the wire document every request travels in
//! - `KeyPair`: key generation and signing for clients and the bank signer

pub mod envelope;
pub mod error;
pub mod gate;
pub mod permission;
pub mod signature;

pub use cosign_core::SignatureAlgorithm;
pub use envelope::{EnvelopeBody, SignedEnvelope};
pub use error::{GateError, GateResult};
pub use gate::PermissionGate;
pub use permission::{AllowAll, PermissionRegistry, StaticPolicy};
pub use signature::{verify_signature, KeyPair, Signer};
