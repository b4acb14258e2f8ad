//! Mutation batches, receipts and commit statuses

use cosign_core::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A stored value and its version.
///
/// Versions come from a store-wide counter. Every `Set` takes a value
/// larger than any the store has handed out, so a key that is deleted and
/// written again never repeats an earlier version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    pub data: Vec<u8>,
    pub version: u64,
}

impl StateEntry {
    /// Stored bytes as UTF-8, lossy
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// One write in a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    Set { address: Address, data: Vec<u8> },
    Delete { address: Address },
}

impl Mutation {
    pub fn address(&self) -> &Address {
        match self {
            Mutation::Set { address, .. } | Mutation::Delete { address } => address,
        }
    }
}

/// Condition the ledger checks against its state before applying a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "expect", rename_all = "snake_case")]
pub enum Precondition {
    /// Key exists with exactly this version
    Version { address: Address, version: u64 },
    /// Key does not exist
    Absent { address: Address },
    /// Key exists, any version
    Present { address: Address },
}

/// Writes and deletes applied all-or-nothing.
///
/// If any precondition fails, or a delete targets a key that is absent
/// before the batch, nothing is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationBatch {
    pub mutations: Vec<Mutation>,
    pub preconditions: Vec<Precondition>,
}

impl MutationBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, address: Address, data: impl Into<Vec<u8>>) -> Self {
        self.mutations.push(Mutation::Set {
            address,
            data: data.into(),
        });
        self
    }

    pub fn delete(mut self, address: Address) -> Self {
        self.mutations.push(Mutation::Delete { address });
        self
    }

    pub fn expect_version(mut self, address: Address, version: u64) -> Self {
        self.preconditions
            .push(Precondition::Version { address, version });
        self
    }

    pub fn expect_absent(mut self, address: Address) -> Self {
        self.preconditions.push(Precondition::Absent { address });
        self
    }

    pub fn expect_present(mut self, address: Address) -> Self {
        self.preconditions.push(Precondition::Present { address });
        self
    }

    /// Distinct addresses written or deleted by this batch
    pub fn addresses(&self) -> BTreeSet<Address> {
        self.mutations.iter().map(|m| m.address().clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Check the batch against current versions (`None` = absent)
    pub fn check(&self, version_of: impl Fn(&Address) -> Option<u64>) -> Result<(), RejectReason> {
        for precondition in &self.preconditions {
            match precondition {
                Precondition::Version { address, version } => {
                    let found = version_of(address);
                    if found != Some(*version) {
                        return Err(RejectReason::VersionConflict {
                            address: address.clone(),
                            expected: Some(*version),
                            found,
                        });
                    }
                }
                Precondition::Absent { address } => {
                    let found = version_of(address);
                    if found.is_some() {
                        return Err(RejectReason::VersionConflict {
                            address: address.clone(),
                            expected: None,
                            found,
                        });
                    }
                }
                Precondition::Present { address } => {
                    if version_of(address).is_none() {
                        return Err(RejectReason::MissingKey {
                            address: address.clone(),
                        });
                    }
                }
            }
        }

        for mutation in &self.mutations {
            if let Mutation::Delete { address } = mutation {
                if version_of(address).is_none() {
                    return Err(RejectReason::MissingKey {
                        address: address.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Handle returned by `submit`, used to poll for the outcome
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Receipt(pub String);

impl Receipt {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why the ledger refused a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    VersionConflict {
        address: Address,
        expected: Option<u64>,
        found: Option<u64>,
    },
    MissingKey {
        address: Address,
    },
    Invalid {
        message: String,
    },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::VersionConflict {
                address,
                expected,
                found,
            } => write!(
                f,
                "version conflict on {}: expected {:?}, found {:?}",
                address, expected, found
            ),
            RejectReason::MissingKey { address } => write!(f, "missing key {}", address),
            RejectReason::Invalid { message } => write!(f, "invalid batch: {}", message),
        }
    }
}

/// Outcome of a submitted batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommitStatus {
    Pending,
    Committed { addresses: Vec<Address> },
    Rejected { reason: RejectReason },
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosign_core::Namespace;
    use std::collections::HashMap;

    fn addresses() -> (Address, Address) {
        let ns = Namespace::for_account("AB12XF3");
        (
            ns.public_keys_address("ID12345").unwrap(),
            ns.group_address("ID12345", "tellers").unwrap(),
        )
    }

    #[test]
    fn test_batch_builder_addresses_are_distinct() {
        let (a, b) = addresses();
        let batch = MutationBatch::new()
            .set(a.clone(), b"one".to_vec())
            .set(a.clone(), b"two".to_vec())
            .delete(b.clone());
        assert_eq!(batch.mutations.len(), 3);
        assert_eq!(batch.addresses().len(), 2);
        assert!(!batch.is_empty());
    }

    #[test]
    fn test_check_version_precondition() {
        let (a, _) = addresses();
        let versions: HashMap<Address, u64> = [(a.clone(), 3)].into_iter().collect();
        let lookup = |addr: &Address| versions.get(addr).copied();

        let ok = MutationBatch::new().set(a.clone(), "x").expect_version(a.clone(), 3);
        assert!(ok.check(lookup).is_ok());

        let stale = MutationBatch::new().set(a.clone(), "x").expect_version(a.clone(), 2);
        assert_eq!(
            stale.check(lookup),
            Err(RejectReason::VersionConflict {
                address: a,
                expected: Some(2),
                found: Some(3),
            })
        );
    }

    #[test]
    fn test_check_absent_and_present() {
        let (a, b) = addresses();
        let lookup = |addr: &Address| if *addr == a { Some(1) } else { None };

        assert!(MutationBatch::new().expect_absent(b.clone()).check(lookup).is_ok());
        assert!(MutationBatch::new().expect_absent(a.clone()).check(lookup).is_err());
        assert!(MutationBatch::new().expect_present(a.clone()).check(lookup).is_ok());
        assert_eq!(
            MutationBatch::new().expect_present(b.clone()).check(lookup),
            Err(RejectReason::MissingKey { address: b })
        );
    }

    #[test]
    fn test_delete_of_absent_key_rejected() {
        let (a, _) = addresses();
        let batch = MutationBatch::new().delete(a.clone());
        assert_eq!(
            batch.check(|_| None),
            Err(RejectReason::MissingKey { address: a })
        );
    }

    #[test]
    fn test_commit_status_serde() {
        let (a, _) = addresses();
        let status = CommitStatus::Committed {
            addresses: vec![a],
        };
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains(r#""status":"committed""#));
        let back: CommitStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, status);
    }
}
