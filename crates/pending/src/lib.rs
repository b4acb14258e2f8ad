//! # Cosign Pending
//!
//! Transactions held back until a quorum of initiators has signed.
//!
//! ## Lifecycle
//! - `create`: written by the orchestrator when a query triggers quorum rules
//! - `add_signature`: CAS update of the signature requirement; settles on the last one
//! - `cancel`: only the original initiator, with a registered key
//! - `expire_stale`: optional, when a pending ttl is configured
//!
//! Settled and cancelled records are deleted; nothing terminal is retained.

mod directory;
mod error;
mod machine;
mod record;

pub use directory::KeyDirectory;
pub use error::{PendingError, PendingResult};
pub use machine::{CreateOutcome, PendingMachine, SignatureProgress};
pub use record::{PendingTransaction, SignatureRequirement};
