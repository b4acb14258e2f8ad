//! Cosign Ledger - versioned key-value state
//!
//! The authorization engine keeps all of its state in a ledger it does not
//! own. This crate is the interface it needs from that ledger:
//! - `StateStore`: per-key reads, prefix listing, batch submit and poll
//! - `MutationBatch`: all-or-nothing writes guarded by version preconditions
//! - `Committer`: submit, then wait (bounded) for confirmation
//!
//! Two implementations ship with it: `MemoryStore` for tests and embedding,
//! `SqliteStore` for the CLI.

pub mod batch;
pub mod committer;
pub mod error;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use batch::{CommitStatus, Mutation, MutationBatch, Precondition, Receipt, RejectReason, StateEntry};
pub use committer::Committer;
pub use error::{LedgerError, LedgerResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::StateStore;
