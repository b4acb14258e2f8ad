//! Pending transaction records

use chrono::{DateTime, Duration, Utc};
use cosign_rules::Quorum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Who still has to sign, per quorum group.
///
/// `authorised_sigs[i]` maps each eligible signer of group `i` to whether
/// they have signed; `required_min_sigs[i]` is how many more signatures
/// group `i` needs. Counters never go below zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRequirement {
    pub authorised_sigs: Vec<BTreeMap<String, bool>>,
    pub required_min_sigs: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl SignatureRequirement {
    /// Seed from the quorums a query triggered, pre-signing the initiator
    /// in every group that lists them
    pub fn from_quorums(quorums: &[Quorum], initiator: &str) -> Self {
        let mut requirement = Self {
            authorised_sigs: quorums
                .iter()
                .map(|q| q.signers.iter().map(|s| (s.clone(), false)).collect())
                .collect(),
            required_min_sigs: quorums.iter().map(|q| q.min_signers).collect(),
            created_at: None,
            expires_at: None,
        };
        requirement.sign(initiator);
        requirement
    }

    /// Stamp creation time and, when a ttl is configured, the expiry
    pub fn with_expiry(mut self, now: DateTime<Utc>, ttl: Option<Duration>) -> Self {
        if let Some(ttl) = ttl {
            self.created_at = Some(now);
            self.expires_at = Some(now + ttl);
        }
        self
    }

    /// Groups where `signer` is listed, has not signed, and a signature is still needed
    fn owed_groups<'a>(&'a self, signer: &'a str) -> impl Iterator<Item = usize> + 'a {
        self.authorised_sigs
            .iter()
            .zip(&self.required_min_sigs)
            .enumerate()
            .filter(move |(_, (group, remaining))| {
                **remaining > 0 && group.get(signer) == Some(&false)
            })
            .map(|(i, _)| i)
    }

    /// Does `signer` still owe a signature anywhere?
    pub fn owes(&self, signer: &str) -> bool {
        self.owed_groups(signer).next().is_some()
    }

    /// Mark `signer` in every group that still needs them.
    /// Returns false if nothing changed.
    pub fn sign(&mut self, signer: &str) -> bool {
        let groups: Vec<usize> = self.owed_groups(signer).collect();
        for &i in &groups {
            self.authorised_sigs[i].insert(signer.to_string(), true);
            self.required_min_sigs[i] = self.required_min_sigs[i].saturating_sub(1);
        }
        !groups.is_empty()
    }

    /// Every counter at zero
    pub fn is_settled(&self) -> bool {
        self.required_min_sigs.iter().all(|n| *n == 0)
    }

    pub fn remaining(&self) -> u32 {
        self.required_min_sigs.iter().sum()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// A pending transaction as read back from the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTransaction {
    pub transaction_id: String,
    pub source_account: String,
    pub initiator: String,
    /// The original query payload, as signed
    pub bank_transaction: String,
    pub signature_requirement: SignatureRequirement,
}
