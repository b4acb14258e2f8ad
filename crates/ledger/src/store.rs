//! State store interface

use async_trait::async_trait;
use cosign_core::{Address, Prefix};
use std::collections::HashMap;

use crate::batch::{CommitStatus, MutationBatch, Receipt, StateEntry};
use crate::error::LedgerResult;

/// Versioned key-value ledger with asynchronous batch commits.
///
/// Reads are linearizable per key. A submitted batch is applied
/// all-or-nothing; its outcome is learned by polling the receipt.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Fetch the given keys; missing keys are absent from the map
    async fn get(&self, addresses: &[Address]) -> LedgerResult<HashMap<Address, StateEntry>>;

    /// Every entry whose address starts with `prefix`, ordered by address
    async fn list(&self, prefix: &Prefix) -> LedgerResult<Vec<(Address, StateEntry)>>;

    /// Hand a batch to the ledger
    async fn submit(&self, batch: MutationBatch) -> LedgerResult<Receipt>;

    /// Current status of a submitted batch
    async fn poll(&self, receipt: &Receipt) -> LedgerResult<CommitStatus>;

    /// Fetch a single key
    async fn get_one(&self, address: &Address) -> LedgerResult<Option<StateEntry>> {
        let mut found = self.get(std::slice::from_ref(address)).await?;
        Ok(found.remove(address))
    }
}
