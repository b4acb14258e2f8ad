//! Cosign RPC - operator CLI
//!
//! This crate provides the CLI binary and the application context that
//! wires a SQLite ledger and key files into the request processor.

pub mod commands;
pub mod context;

pub use context::AppContext;
