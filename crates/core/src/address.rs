//! Deterministic ledger addressing
//!
//! Every address is exactly `ADDRESS_LENGTH` lowercase hex chars:
//!
//! ```text
//! initiator leaf: namespace(6) | 01 | actor(40) | subspace(2) | field(20)
//! recipient leaf: namespace(6) | 02 | actor(40) | 01          | field(20)
//! pending leaf:   namespace(6) | 07 | subspace(2) | transaction id(60)
//! ```
//!
//! The namespace is the truncated digest of the family name (source account
//! plus permission tag). The actor segment is the truncated digest of the
//! initiator or recipient name, the field segment the truncated digest of the
//! stored item. Only the field segment of a rule leaf is ever read back
//! (as the rule hash).

use crate::hash::{is_lower_hex, truncated_hex};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Total length of every ledger address
pub const ADDRESS_LENGTH: usize = 70;
/// Width of the family namespace prefix
pub const NAMESPACE_LENGTH: usize = 6;
/// Width of the initiator / recipient segment
pub const ACTOR_LENGTH: usize = 40;
/// Width of the trailing item segment
pub const FIELD_LENGTH: usize = 20;
/// A rule hash is the field segment of the rule's leaf address
pub const RULE_HASH_LENGTH: usize = FIELD_LENGTH;
/// Width of a pending transaction id
pub const TRANSACTION_ID_LENGTH: usize = 60;

/// Permission tag appended to the source account to form the family name.
/// Rules, groups, keys and pending transactions all share the empty tag.
pub const PERMISSION_TAG: &str = "";

/// Reserved group holding account-level rules, applies to every initiator
pub const ACCOUNT_LEVEL_GROUP: &str = "Everyone";

const INITIATOR_TAG: &str = "01";
const RECIPIENT_TAG: &str = "02";
const PENDING_TAG: &str = "07";

// All public keys of one initiator live under a single leaf.
const PUBLIC_KEYS_SEED: &str = "public keys live here";

/// Errors raised while building or parsing addresses
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Address must be {expected} chars, got {actual}: {address}")]
    Length {
        expected: usize,
        actual: usize,
        address: String,
    },

    #[error("Address is not lowercase hex: {0}")]
    NotHex(String),

    #[error("Rule hash must be 20 lowercase hex chars: {0}")]
    InvalidRuleHash(String),

    #[error("Transaction id must be 60 lowercase hex chars: {0}")]
    InvalidTransactionId(String),
}

/// Sub-subspace tag following the actor segment (or the pending tag)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subspace {
    /// Initiator rules
    Rules,
    /// Initiator group memberships
    Groups,
    /// Initiator public keys
    PublicKeys,
    /// Recipient destination accounts
    Accounts,
    /// Pending signature requirement
    Signatures,
    /// Pending original query body
    TransactionBody,
    /// Pending initiator marker
    InitiatorMarker,
}

impl Subspace {
    /// Two-char tag written into the address
    pub const fn tag(self) -> &'static str {
        match self {
            Subspace::Rules => "01",
            Subspace::Groups => "02",
            Subspace::PublicKeys => "03",
            Subspace::Accounts => "01",
            Subspace::Signatures => "08",
            Subspace::TransactionBody => "09",
            Subspace::InitiatorMarker => "12",
        }
    }

    /// The three co-located entries of one pending transaction
    pub const PENDING: [Subspace; 3] = [
        Subspace::TransactionBody,
        Subspace::Signatures,
        Subspace::InitiatorMarker,
    ];
}

/// A validated ledger key of exactly `ADDRESS_LENGTH` lowercase hex chars
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Validate a raw string as an address
    pub fn new(value: impl Into<String>) -> Result<Self, AddressError> {
        let value = value.into();
        if value.len() != ADDRESS_LENGTH {
            return Err(AddressError::Length {
                expected: ADDRESS_LENGTH,
                actual: value.len(),
                address: value,
            });
        }
        if !is_lower_hex(&value) {
            return Err(AddressError::NotHex(value));
        }
        Ok(Self(value))
    }

    fn from_segments(segments: &[&str]) -> Result<Self, AddressError> {
        Self::new(segments.concat())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// True when this address lies under `prefix`
    pub fn starts_with(&self, prefix: &Prefix) -> bool {
        self.0.starts_with(prefix.as_str())
    }

    /// Trailing segment after `prefix`, if the address lies under it
    pub fn suffix_after<'a>(&'a self, prefix: &Prefix) -> Option<&'a str> {
        self.0.strip_prefix(prefix.as_str())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

/// A wildcard: the leading part of an address, used to enumerate a subspace
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Prefix(String);

impl Prefix {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn extend(&self, segment: &str) -> Prefix {
        Prefix(format!("{}{}", self.0, segment))
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Family name scoping addresses and permission checks
pub fn family_name(source_account: &str, permission_tag: &str) -> String {
    format!("{}{}", source_account, permission_tag)
}

/// Hash identifying a rule: the field segment of its leaf address
pub fn rule_hash(expression: &str) -> String {
    truncated_hex(expression, FIELD_LENGTH)
}

/// Recover the rule hash stored in the trailing segment of a rule leaf
pub fn rule_hash_from_address(address: &Address) -> &str {
    &address.as_str()[ADDRESS_LENGTH - RULE_HASH_LENGTH..]
}

/// Reject rule hashes that could not have come from `rule_hash`
pub fn validate_rule_hash(hash: &str) -> Result<(), AddressError> {
    if hash.len() == RULE_HASH_LENGTH && is_lower_hex(hash) {
        Ok(())
    } else {
        Err(AddressError::InvalidRuleHash(hash.to_string()))
    }
}

/// Reject transaction ids of the wrong shape before building addresses
pub fn validate_transaction_id(id: &str) -> Result<(), AddressError> {
    if id.len() == TRANSACTION_ID_LENGTH && is_lower_hex(id) {
        Ok(())
    } else {
        Err(AddressError::InvalidTransactionId(id.to_string()))
    }
}

fn actor(name: &str) -> String {
    truncated_hex(name, ACTOR_LENGTH)
}

fn field(item: &str) -> String {
    truncated_hex(item, FIELD_LENGTH)
}

/// Address builder for one family (source account + permission tag)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    family: String,
    prefix: String,
}

impl Namespace {
    pub fn new(source_account: &str, permission_tag: &str) -> Self {
        let family = family_name(source_account, permission_tag);
        let prefix = truncated_hex(&family, NAMESPACE_LENGTH);
        Self { family, prefix }
    }

    /// Namespace of an account under the default permission tag
    pub fn for_account(source_account: &str) -> Self {
        Self::new(source_account, PERMISSION_TAG)
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    /// The 6-char namespace prefix
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    // === Initiators ===

    pub fn initiator_root(&self) -> Prefix {
        Prefix(format!("{}{}", self.prefix, INITIATOR_TAG))
    }

    /// Everything stored for one initiator
    pub fn initiator_wildcard(&self, initiator: &str) -> Prefix {
        self.initiator_root().extend(&actor(initiator))
    }

    /// One subspace (rules, groups, keys) of an initiator
    pub fn initiator_subspace(&self, initiator: &str, subspace: Subspace) -> Prefix {
        self.initiator_wildcard(initiator).extend(subspace.tag())
    }

    pub fn rule_address(&self, initiator: &str, expression: &str) -> Result<Address, AddressError> {
        self.rule_address_from_hash(initiator, &rule_hash(expression))
    }

    /// Rebuild a rule leaf from the hash handed out at creation
    pub fn rule_address_from_hash(
        &self,
        initiator: &str,
        hash: &str,
    ) -> Result<Address, AddressError> {
        validate_rule_hash(hash)?;
        let subspace = self.initiator_subspace(initiator, Subspace::Rules);
        Address::from_segments(&[subspace.as_str(), hash])
    }

    pub fn group_address(&self, initiator: &str, group: &str) -> Result<Address, AddressError> {
        let subspace = self.initiator_subspace(initiator, Subspace::Groups);
        Address::from_segments(&[subspace.as_str(), &field(group)])
    }

    pub fn public_keys_address(&self, initiator: &str) -> Result<Address, AddressError> {
        let subspace = self.initiator_subspace(initiator, Subspace::PublicKeys);
        Address::from_segments(&[subspace.as_str(), &field(PUBLIC_KEYS_SEED)])
    }

    // === Recipients ===

    pub fn recipient_root(&self) -> Prefix {
        Prefix(format!("{}{}", self.prefix, RECIPIENT_TAG))
    }

    /// Destination accounts registered for a recipient
    pub fn recipient_accounts(&self, recipient: &str) -> Prefix {
        self.recipient_root()
            .extend(&actor(recipient))
            .extend(Subspace::Accounts.tag())
    }

    pub fn recipient_account_address(
        &self,
        recipient: &str,
        dest_account: &str,
    ) -> Result<Address, AddressError> {
        let subspace = self.recipient_accounts(recipient);
        Address::from_segments(&[subspace.as_str(), &field(dest_account)])
    }

    // === Pending transactions ===

    pub fn pending_root(&self) -> Prefix {
        Prefix(format!("{}{}", self.prefix, PENDING_TAG))
    }

    /// All entries of one kind (e.g. every signature requirement) in the account
    pub fn pending_subspace(&self, subspace: Subspace) -> Prefix {
        self.pending_root().extend(subspace.tag())
    }

    pub fn pending_address(
        &self,
        subspace: Subspace,
        transaction_id: &str,
    ) -> Result<Address, AddressError> {
        validate_transaction_id(transaction_id)?;
        let prefix = self.pending_subspace(subspace);
        Address::from_segments(&[prefix.as_str(), transaction_id])
    }

    /// Body, signature requirement and initiator marker, in that order
    pub fn pending_group(&self, transaction_id: &str) -> Result<[Address; 3], AddressError> {
        Ok([
            self.pending_address(Subspace::TransactionBody, transaction_id)?,
            self.pending_address(Subspace::Signatures, transaction_id)?,
            self.pending_address(Subspace::InitiatorMarker, transaction_id)?,
        ])
    }
}
