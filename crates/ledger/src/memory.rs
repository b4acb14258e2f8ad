//! In-memory state store
//!
//! Batches are applied when submitted; the receipt may be held in
//! `Pending` for a configurable number of polls to exercise callers that
//! wait for confirmation. A receipt is dropped once a terminal status has
//! been polled.

use async_trait::async_trait;
use cosign_core::{Address, Prefix};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

use crate::batch::{CommitStatus, Mutation, MutationBatch, Receipt, StateEntry};
use crate::error::{LedgerError, LedgerResult};
use crate::store::StateStore;

struct ReceiptState {
    status: CommitStatus,
    polls_left: u32,
}

#[derive(Default)]
struct Inner {
    entries: BTreeMap<Address, StateEntry>,
    receipts: HashMap<Receipt, ReceiptState>,
    /// Last version handed out by any `Set`
    last_version: u64,
}

/// State store backed by a `BTreeMap`
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    commit_delay: u32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `Pending` for the first `polls` polls of every receipt
    pub fn with_commit_delay(polls: u32) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            commit_delay: polls,
        }
    }

    /// Receipts not yet polled to a terminal status
    pub async fn open_receipts(&self) -> usize {
        self.inner.lock().await.receipts.len()
    }

    /// Number of stored keys
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Inner {
    /// Apply a checked batch. Every `Set` takes the next store-wide version,
    /// so a key deleted and written again never repeats an old version.
    fn apply(&mut self, batch: MutationBatch) -> Vec<Address> {
        let addresses: Vec<Address> = batch.addresses().into_iter().collect();
        for mutation in batch.mutations {
            match mutation {
                Mutation::Set { address, data } => {
                    self.last_version += 1;
                    let version = self.last_version;
                    self.entries.insert(address, StateEntry { data, version });
                }
                Mutation::Delete { address } => {
                    self.entries.remove(&address);
                }
            }
        }
        addresses
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, addresses: &[Address]) -> LedgerResult<HashMap<Address, StateEntry>> {
        let inner = self.inner.lock().await;
        Ok(addresses
            .iter()
            .filter_map(|a| inner.entries.get(a).map(|e| (a.clone(), e.clone())))
            .collect())
    }

    async fn list(&self, prefix: &Prefix) -> LedgerResult<Vec<(Address, StateEntry)>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .entries
            .iter()
            .filter(|(address, _)| address.starts_with(prefix))
            .map(|(address, entry)| (address.clone(), entry.clone()))
            .collect())
    }

    async fn submit(&self, batch: MutationBatch) -> LedgerResult<Receipt> {
        let mut inner = self.inner.lock().await;
        let receipt = Receipt::generate();

        let status = {
            let entries = &inner.entries;
            match batch.check(|address| entries.get(address).map(|e| e.version)) {
                Ok(()) => None,
                Err(reason) => Some(CommitStatus::Rejected { reason }),
            }
        };
        let status = match status {
            Some(rejected) => rejected,
            None => CommitStatus::Committed {
                addresses: inner.apply(batch),
            },
        };

        tracing::trace!(receipt = %receipt, ?status, "memory store batch");
        inner.receipts.insert(
            receipt.clone(),
            ReceiptState {
                status,
                polls_left: self.commit_delay,
            },
        );
        Ok(receipt)
    }

    async fn poll(&self, receipt: &Receipt) -> LedgerResult<CommitStatus> {
        let mut inner = self.inner.lock().await;
        let state = inner
            .receipts
            .get_mut(receipt)
            .ok_or_else(|| LedgerError::UnknownReceipt(receipt.to_string()))?;

        if state.polls_left > 0 {
            state.polls_left -= 1;
            return Ok(CommitStatus::Pending);
        }
        let status = state.status.clone();
        inner.receipts.remove(receipt);
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::RejectReason;
    use cosign_core::{Namespace, Subspace};

    fn ns() -> Namespace {
        Namespace::for_account("AB12XF3")
    }

    async fn commit(store: &MemoryStore, batch: MutationBatch) -> CommitStatus {
        let receipt = store.submit(batch).await.unwrap();
        store.poll(&receipt).await.unwrap()
    }

    #[tokio::test]
    async fn test_set_get_and_versions() {
        let store = MemoryStore::new();
        let addr = ns().public_keys_address("ID12345").unwrap();

        commit(&store, MutationBatch::new().set(addr.clone(), "a")).await;
        assert_eq!(store.get_one(&addr).await.unwrap().unwrap().version, 1);

        commit(&store, MutationBatch::new().set(addr.clone(), "b")).await;
        let entry = store.get_one(&addr).await.unwrap().unwrap();
        assert_eq!(entry.version, 2);
        assert_eq!(entry.data, b"b".to_vec());
    }

    #[tokio::test]
    async fn test_missing_keys_absent_from_get() {
        let store = MemoryStore::new();
        let addr = ns().public_keys_address("ID12345").unwrap();
        assert!(store.get(&[addr]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_batch_applies_nothing() {
        let store = MemoryStore::new();
        let a = ns().group_address("ID12345", "g1").unwrap();
        let b = ns().group_address("ID12345", "g2").unwrap();

        commit(&store, MutationBatch::new().set(a.clone(), "g1")).await;

        let status = commit(
            &store,
            MutationBatch::new()
                .set(b.clone(), "g2")
                .delete(a.clone())
                .expect_absent(a.clone()),
        )
        .await;
        assert!(matches!(
            status,
            CommitStatus::Rejected {
                reason: RejectReason::VersionConflict { .. }
            }
        ));
        assert!(store.get_one(&b).await.unwrap().is_none());
        assert!(store.get_one(&a).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_by_prefix_is_ordered() {
        let store = MemoryStore::new();
        let ns = ns();
        let g1 = ns.group_address("ID12345", "g1").unwrap();
        let g2 = ns.group_address("ID12345", "g2").unwrap();
        let other = ns.group_address("CD34YG4", "g1").unwrap();

        commit(
            &store,
            MutationBatch::new()
                .set(g2.clone(), "g2")
                .set(other, "g1")
                .set(g1.clone(), "g1"),
        )
        .await;

        let listed = store
            .list(&ns.initiator_subspace("ID12345", Subspace::Groups))
            .await
            .unwrap();
        let mut expected = vec![g1, g2];
        expected.sort();
        assert_eq!(
            listed.into_iter().map(|(a, _)| a).collect::<Vec<_>>(),
            expected
        );
    }

    #[tokio::test]
    async fn test_commit_delay_reports_pending() {
        let store = MemoryStore::with_commit_delay(2);
        let addr = ns().public_keys_address("ID12345").unwrap();
        let receipt = store.submit(MutationBatch::new().set(addr, "k")).await.unwrap();

        assert_eq!(store.poll(&receipt).await.unwrap(), CommitStatus::Pending);
        assert_eq!(store.poll(&receipt).await.unwrap(), CommitStatus::Pending);
        assert!(matches!(
            store.poll(&receipt).await.unwrap(),
            CommitStatus::Committed { .. }
        ));
    }

    #[tokio::test]
    async fn test_recreated_key_never_reuses_a_version() {
        let store = MemoryStore::new();
        let addr = ns().public_keys_address("ID12345").unwrap();

        commit(&store, MutationBatch::new().set(addr.clone(), "old")).await;
        let stale = store.get_one(&addr).await.unwrap().unwrap().version;
        commit(&store, MutationBatch::new().delete(addr.clone())).await;
        commit(&store, MutationBatch::new().set(addr.clone(), "new")).await;

        let status = commit(
            &store,
            MutationBatch::new()
                .set(addr.clone(), "stale writer")
                .expect_version(addr.clone(), stale),
        )
        .await;
        assert!(matches!(
            status,
            CommitStatus::Rejected {
                reason: RejectReason::VersionConflict { .. }
            }
        ));
        let entry = store.get_one(&addr).await.unwrap().unwrap();
        assert_eq!(entry.text(), "new");
        assert!(entry.version > stale);
    }

    #[tokio::test]
    async fn test_receipt_dropped_after_terminal_poll() {
        let store = MemoryStore::with_commit_delay(1);
        let addr = ns().public_keys_address("ID12345").unwrap();
        let receipt = store.submit(MutationBatch::new().set(addr, "k")).await.unwrap();

        assert_eq!(store.poll(&receipt).await.unwrap(), CommitStatus::Pending);
        assert_eq!(store.open_receipts().await, 1);
        assert!(matches!(
            store.poll(&receipt).await.unwrap(),
            CommitStatus::Committed { .. }
        ));
        assert_eq!(store.open_receipts().await, 0);
        assert!(matches!(
            store.poll(&receipt).await.unwrap_err(),
            LedgerError::UnknownReceipt(_)
        ));
    }

    #[tokio::test]
    async fn test_unknown_receipt() {
        let store = MemoryStore::new();
        let err = store.poll(&Receipt("nope".into())).await.unwrap_err();
        assert!(matches!(err, LedgerError::UnknownReceipt(_)));
    }
}
