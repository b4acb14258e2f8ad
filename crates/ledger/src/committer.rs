//! Submit a batch and wait for its confirmation

use cosign_core::{Address, EngineConfig};
use std::sync::Arc;
use std::time::Duration;

use crate::batch::{CommitStatus, MutationBatch, Receipt};
use crate::error::{LedgerError, LedgerResult};
use crate::store::StateStore;

/// Submits batches and polls until the ledger confirms or rejects them.
///
/// Nothing is reported as committed before the ledger says so. A wait
/// longer than the configured timeout surfaces as `CommitTimeout`.
#[derive(Clone)]
pub struct Committer {
    store: Arc<dyn StateStore>,
    timeout: Duration,
    poll_interval: Duration,
}

impl Committer {
    pub fn new(store: Arc<dyn StateStore>, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            store,
            timeout,
            poll_interval,
        }
    }

    pub fn from_config(store: Arc<dyn StateStore>, config: &EngineConfig) -> Self {
        Self::new(store, config.commit_timeout(), config.poll_interval())
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Commit a batch; returns the confirmed addresses
    pub async fn commit(&self, batch: MutationBatch) -> LedgerResult<Vec<Address>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let expected = batch.addresses().len();
        let receipt = self.store.submit(batch).await?;

        let status = tokio::time::timeout(self.timeout, self.wait(&receipt))
            .await
            .map_err(|_| {
                tracing::warn!(receipt = %receipt, "commit confirmation timed out");
                LedgerError::CommitTimeout {
                    receipt: receipt.to_string(),
                    waited_ms: self.timeout.as_millis() as u64,
                }
            })??;

        match status {
            CommitStatus::Committed { addresses } => {
                if addresses.len() != expected {
                    tracing::error!(
                        receipt = %receipt,
                        expected,
                        committed = addresses.len(),
                        "ledger confirmed a partial batch"
                    );
                    return Err(LedgerError::PartialCommit {
                        expected,
                        committed: addresses.len(),
                    });
                }
                tracing::debug!(receipt = %receipt, count = expected, "batch committed");
                Ok(addresses)
            }
            CommitStatus::Rejected { reason } => {
                tracing::debug!(receipt = %receipt, %reason, "batch rejected");
                Err(LedgerError::Rejected(reason))
            }
            // `wait` only returns terminal statuses
            CommitStatus::Pending => Err(LedgerError::Unavailable(format!(
                "receipt {} still pending",
                receipt
            ))),
        }
    }

    async fn wait(&self, receipt: &Receipt) -> LedgerResult<CommitStatus> {
        loop {
            match self.store.poll(receipt).await? {
                CommitStatus::Pending => tokio::time::sleep(self.poll_interval).await,
                terminal => return Ok(terminal),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use cosign_core::Namespace;

    fn committer(store: MemoryStore, timeout_ms: u64) -> Committer {
        Committer::new(
            Arc::new(store),
            Duration::from_millis(timeout_ms),
            Duration::from_millis(1),
        )
    }

    fn address(group: &str) -> Address {
        Namespace::for_account("AB12XF3")
            .group_address("ID12345", group)
            .unwrap()
    }

    #[tokio::test]
    async fn test_commit_waits_for_confirmation() {
        let committer = committer(MemoryStore::with_commit_delay(3), 1_000);
        let committed = committer
            .commit(
                MutationBatch::new()
                    .set(address("a"), "a")
                    .set(address("b"), "b"),
            )
            .await
            .unwrap();
        assert_eq!(committed.len(), 2);
    }

    #[tokio::test]
    async fn test_commit_rejection_surfaces() {
        let committer = committer(MemoryStore::new(), 1_000);
        let err = committer
            .commit(MutationBatch::new().delete(address("missing")))
            .await
            .unwrap_err();
        assert!(err.is_missing_key());
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_commit_timeout_is_transient() {
        let committer = committer(MemoryStore::with_commit_delay(u32::MAX), 20);
        let err = committer
            .commit(MutationBatch::new().set(address("a"), "a"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::CommitTimeout { waited_ms: 20, .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let committer = committer(MemoryStore::new(), 1_000);
        assert!(committer.commit(MutationBatch::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_conflict_is_transient() {
        let committer = committer(MemoryStore::new(), 1_000);
        committer
            .commit(MutationBatch::new().set(address("a"), "a"))
            .await
            .unwrap();
        let err = committer
            .commit(
                MutationBatch::new()
                    .set(address("a"), "b")
                    .expect_absent(address("a")),
            )
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert!(err.is_transient());
    }
}
