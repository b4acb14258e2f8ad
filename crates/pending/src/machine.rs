//! Pending-transaction state machine
//!
//! ```text
//! NonExistent --create--> AwaitingSignatures --add_signature--> AwaitingSignatures
//!                                  |                       \--> Settled   (entries deleted)
//!                                  \--cancel--------------------> Cancelled (entries deleted)
//! ```
//!
//! A record is three co-located ledger entries (body, signature requirement,
//! initiator marker) that are written and deleted in one batch. Updates to
//! the signature requirement are compare-and-swap on the versions of all
//! three; the signature that meets the last quorum deletes the record in
//! that same batch.

use chrono::{DateTime, Utc};
use cosign_core::{Address, EngineConfig, Namespace, Subspace, TRANSACTION_ID_LENGTH};
use cosign_gate::{verify_signature, Signer};
use cosign_ledger::{Committer, MutationBatch, StateEntry, StateStore};
use cosign_rules::Quorum;
use std::sync::Arc;

use crate::directory::KeyDirectory;
use crate::error::{PendingError, PendingResult};
use crate::record::{PendingTransaction, SignatureRequirement};

/// Result of `create`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// A new record now exists
    Created(String),
    /// The same query is already pending under this id; nothing was written
    Existing(String),
    /// The initiator's own signature met every quorum; nothing was written
    SatisfiedByInitiator,
}

/// Result of a successful `add_signature`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureProgress {
    /// Every quorum met; the record is gone
    Settled,
    /// Signature recorded; this many signatures are still needed
    StillPending { remaining: u32 },
}

/// Owns the lifecycle of pending transactions
pub struct PendingMachine {
    committer: Committer,
    bank_signer: Arc<dyn Signer>,
    keys: Arc<dyn KeyDirectory>,
    config: EngineConfig,
}

struct Snapshot {
    addresses: [Address; 3],
    body: StateEntry,
    sigs: StateEntry,
    marker: StateEntry,
    requirement: SignatureRequirement,
}

impl PendingMachine {
    pub fn new(
        committer: Committer,
        bank_signer: Arc<dyn Signer>,
        keys: Arc<dyn KeyDirectory>,
        config: EngineConfig,
    ) -> Self {
        Self {
            committer,
            bank_signer,
            keys,
            config,
        }
    }

    fn store(&self) -> &Arc<dyn StateStore> {
        self.committer.store()
    }

    /// Transaction id for a query body: the bank's signature over it, truncated
    pub fn transaction_id(&self, body: &str) -> String {
        let mut id = self.bank_signer.sign_hex(body.as_bytes());
        id.truncate(TRANSACTION_ID_LENGTH);
        id
    }

    // === Create ===

    /// Create a record for a query that triggered `quorums`
    pub async fn create(
        &self,
        source_account: &str,
        initiator: &str,
        body: &str,
        quorums: &[Quorum],
    ) -> PendingResult<CreateOutcome> {
        let requirement = SignatureRequirement::from_quorums(quorums, initiator)
            .with_expiry(Utc::now(), self.config.pending_ttl());
        if requirement.is_settled() {
            tracing::debug!(account = source_account, initiator, "quorum met by initiator alone");
            return Ok(CreateOutcome::SatisfiedByInitiator);
        }

        let transaction_id = self.transaction_id(body);
        let ns = Namespace::for_account(source_account);
        let [body_addr, sigs_addr, marker_addr] = ns.pending_group(&transaction_id)?;

        let batch = MutationBatch::new()
            .set(body_addr.clone(), body)
            .set(sigs_addr.clone(), encode(&sigs_addr, &requirement)?)
            .set(marker_addr.clone(), initiator)
            .expect_absent(body_addr)
            .expect_absent(sigs_addr)
            .expect_absent(marker_addr);

        match self.committer.commit(batch).await {
            Ok(_) => {
                tracing::info!(
                    account = source_account,
                    initiator,
                    transaction_id = %transaction_id,
                    remaining = requirement.remaining(),
                    "pending transaction created"
                );
                Ok(CreateOutcome::Created(transaction_id))
            }
            Err(e) if e.is_conflict() => {
                tracing::debug!(transaction_id = %transaction_id, "query already pending");
                Ok(CreateOutcome::Existing(transaction_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    // === Add signature ===

    /// Record `initiator`'s signature over the stored body
    pub async fn add_signature(
        &self,
        source_account: &str,
        initiator: &str,
        transaction_id: &str,
        signature_hex: &str,
        public_key_hex: &str,
    ) -> PendingResult<SignatureProgress> {
        let ns = Namespace::for_account(source_account);
        let max_attempts = self.config.max_cas_retries + 1;

        for attempt in 1..=max_attempts {
            let Some(snapshot) = self.snapshot(&ns, transaction_id).await? else {
                return Err(PendingError::NotFound(transaction_id.to_string()));
            };
            let mut requirement = snapshot.requirement.clone();

            if requirement.is_expired(Utc::now()) {
                self.retire(&snapshot).await?;
                tracing::info!(transaction_id, "pending transaction expired");
                return Err(PendingError::Expired(transaction_id.to_string()));
            }

            if !requirement.owes(initiator) {
                if requirement.is_settled() {
                    // quorum already met; finish the settlement
                    if !self.retire(&snapshot).await? {
                        continue;
                    }
                    tracing::info!(transaction_id, initiator, "settled record retired");
                    return Ok(SignatureProgress::Settled);
                }
                tracing::warn!(transaction_id, initiator, "signer not owed");
                return Err(PendingError::NotAuthorizedOrAlreadySigned {
                    initiator: initiator.to_string(),
                    transaction_id: transaction_id.to_string(),
                });
            }

            if !self
                .keys
                .is_known_key(source_account, initiator, public_key_hex)
                .await?
            {
                tracing::warn!(transaction_id, initiator, "unknown signer key");
                return Err(PendingError::UnknownKey {
                    initiator: initiator.to_string(),
                });
            }

            if !verify_signature(
                self.config.signature_algorithm,
                &snapshot.body.data,
                signature_hex,
                public_key_hex,
            ) {
                tracing::error!(transaction_id, initiator, "signature does not match stored body");
                return Err(PendingError::InvalidSignature {
                    transaction_id: transaction_id.to_string(),
                });
            }

            requirement.sign(initiator);
            let settled = requirement.is_settled();
            let [body_addr, sigs_addr, marker_addr] = snapshot.addresses.clone();

            // The last signature deletes the record outright: one batch, so
            // a failed commit leaves the signer free to retry.
            let batch = if settled {
                MutationBatch::new()
                    .delete(body_addr.clone())
                    .delete(sigs_addr.clone())
                    .delete(marker_addr.clone())
            } else {
                MutationBatch::new().set(sigs_addr.clone(), encode(&sigs_addr, &requirement)?)
            };
            let batch = batch
                .expect_version(sigs_addr, snapshot.sigs.version)
                .expect_version(body_addr, snapshot.body.version)
                .expect_version(marker_addr, snapshot.marker.version);

            match self.committer.commit(batch).await {
                Ok(_) => {}
                Err(e) if e.is_conflict() || e.is_missing_key() => {
                    tracing::debug!(transaction_id, initiator, attempt, "signature update raced, retrying");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }

            if settled {
                tracing::info!(transaction_id, initiator, "pending transaction settled");
                return Ok(SignatureProgress::Settled);
            }
            let remaining = requirement.remaining();
            tracing::info!(transaction_id, initiator, remaining, "signature recorded");
            return Ok(SignatureProgress::StillPending { remaining });
        }

        tracing::warn!(transaction_id, attempts = max_attempts, "signature update contention");
        Err(PendingError::Contention {
            transaction_id: transaction_id.to_string(),
            attempts: max_attempts,
        })
    }

    // === Cancel ===

    /// Delete a record on behalf of the initiator who created it
    pub async fn cancel(
        &self,
        source_account: &str,
        initiator: &str,
        transaction_id: &str,
        public_key_hex: &str,
    ) -> PendingResult<()> {
        let ns = Namespace::for_account(source_account);
        let Some(snapshot) = self.snapshot(&ns, transaction_id).await? else {
            return Err(PendingError::NotFound(transaction_id.to_string()));
        };

        if snapshot.marker.text() != initiator {
            tracing::warn!(transaction_id, caller = initiator, "cancel by non-initiator");
            return Err(PendingError::NotInitiator {
                caller: initiator.to_string(),
                transaction_id: transaction_id.to_string(),
            });
        }
        if !self
            .keys
            .is_known_key(source_account, initiator, public_key_hex)
            .await?
        {
            tracing::warn!(transaction_id, initiator, "cancel with unknown key");
            return Err(PendingError::UnknownKey {
                initiator: initiator.to_string(),
            });
        }

        if !self.retire(&snapshot).await? {
            return Err(PendingError::NotFound(transaction_id.to_string()));
        }
        tracing::info!(transaction_id, initiator, "pending transaction cancelled");
        Ok(())
    }

    // === Queries ===

    /// Records on which `initiator` still owes a signature
    pub async fn list(
        &self,
        source_account: &str,
        initiator: &str,
    ) -> PendingResult<Vec<PendingTransaction>> {
        let now = Utc::now();
        let mut owed = Vec::new();
        for (transaction_id, requirement) in self.requirements(source_account).await? {
            if requirement.is_expired(now) || !requirement.owes(initiator) {
                continue;
            }
            // may have settled or been cancelled since the listing
            if let Some(record) = self.get(source_account, &transaction_id).await? {
                owed.push(record);
            }
        }
        Ok(owed)
    }

    /// Read one record
    pub async fn get(
        &self,
        source_account: &str,
        transaction_id: &str,
    ) -> PendingResult<Option<PendingTransaction>> {
        let ns = Namespace::for_account(source_account);
        Ok(self
            .snapshot(&ns, transaction_id)
            .await?
            .map(|snapshot| PendingTransaction {
                transaction_id: transaction_id.to_string(),
                source_account: source_account.to_string(),
                initiator: snapshot.marker.text(),
                bank_transaction: snapshot.body.text(),
                signature_requirement: snapshot.requirement,
            }))
    }

    /// Retire every expired (or settled but undeleted) record of an account.
    /// Returns the retired transaction ids.
    pub async fn expire_stale(&self, source_account: &str) -> PendingResult<Vec<String>> {
        self.expire_stale_at(source_account, Utc::now()).await
    }

    pub async fn expire_stale_at(
        &self,
        source_account: &str,
        now: DateTime<Utc>,
    ) -> PendingResult<Vec<String>> {
        let ns = Namespace::for_account(source_account);
        let mut retired = Vec::new();

        for (transaction_id, requirement) in self.requirements(source_account).await? {
            if !requirement.is_expired(now) && !requirement.is_settled() {
                continue;
            }
            if let Some(snapshot) = self.snapshot(&ns, &transaction_id).await? {
                if self.retire(&snapshot).await? {
                    tracing::info!(account = source_account, transaction_id = %transaction_id, "stale pending transaction retired");
                    retired.push(transaction_id);
                }
            }
        }
        Ok(retired)
    }

    // === Internals ===

    /// Every signature requirement stored for an account
    async fn requirements(
        &self,
        source_account: &str,
    ) -> PendingResult<Vec<(String, SignatureRequirement)>> {
        let prefix = Namespace::for_account(source_account).pending_subspace(Subspace::Signatures);
        let entries = self.store().list(&prefix).await?;

        let mut found = Vec::with_capacity(entries.len());
        for (address, entry) in entries {
            let Some(transaction_id) = address.suffix_after(&prefix) else {
                continue;
            };
            found.push((transaction_id.to_string(), decode(&address, &entry)?));
        }
        Ok(found)
    }

    /// Read all three entries; `None` when the record does not exist
    async fn snapshot(&self, ns: &Namespace, transaction_id: &str) -> PendingResult<Option<Snapshot>> {
        let addresses = ns.pending_group(transaction_id)?;
        let mut entries = self.store().get(&addresses).await?;

        let [body_addr, sigs_addr, marker_addr] = &addresses;
        match (
            entries.remove(body_addr),
            entries.remove(sigs_addr),
            entries.remove(marker_addr),
        ) {
            (None, None, None) => Ok(None),
            (Some(body), Some(sigs), Some(marker)) => {
                let requirement = decode(sigs_addr, &sigs)?;
                Ok(Some(Snapshot {
                    addresses,
                    body,
                    sigs,
                    marker,
                    requirement,
                }))
            }
            _ => {
                tracing::error!(transaction_id, "pending record partially present");
                Err(PendingError::PartialRecord(transaction_id.to_string()))
            }
        }
    }

    /// Delete the three entries as one unit, conditioned on the versions
    /// seen. Returns false if another writer got there first.
    async fn retire(&self, snapshot: &Snapshot) -> PendingResult<bool> {
        let [body_addr, sigs_addr, marker_addr] = snapshot.addresses.clone();
        let batch = MutationBatch::new()
            .delete(body_addr.clone())
            .delete(sigs_addr.clone())
            .delete(marker_addr.clone())
            .expect_version(sigs_addr, snapshot.sigs.version)
            .expect_version(body_addr, snapshot.body.version)
            .expect_version(marker_addr, snapshot.marker.version);

        match self.committer.commit(batch).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_conflict() || e.is_missing_key() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn encode(address: &Address, requirement: &SignatureRequirement) -> PendingResult<Vec<u8>> {
    serde_json::to_vec(requirement).map_err(|e| PendingError::Corrupt {
        address: address.to_string(),
        message: e.to_string(),
    })
}

fn decode(address: &Address, entry: &StateEntry) -> PendingResult<SignatureRequirement> {
    serde_json::from_slice(&entry.data).map_err(|e| PendingError::Corrupt {
        address: address.to_string(),
        message: e.to_string(),
    })
}
