//! Request-type tags carried in the `type` field of signed envelopes

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Closed set of request kinds understood by the processor
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestKind {
    SetInitiatorRule,
    DeleteInitiatorRule,
    ListInitiatorRules,
    AddInitiatorToGroup,
    RemoveInitiatorFromGroup,
    ListInitiatorGroups,
    SetInitiatorPubKeys,
    DeleteInitiatorPubKeys,
    ListInitiatorPubKeys,
    QueryAuth,
    ClosePendingTx,
    AddSigTx,
    ListPendingTx,
    SetRecipient,
    RemoveRecipient,
    ListRecipient,
    SetAccountLevelRule,
    DeleteAccountLevelRule,
    ListAccountLevelRules,
}

impl RequestKind {
    /// Kinds that may write to the ledger; these need a permitted signer
    pub fn is_mutation(&self) -> bool {
        !self.is_read_only()
    }

    /// Kinds that only read state
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            RequestKind::ListInitiatorRules
                | RequestKind::ListInitiatorGroups
                | RequestKind::ListInitiatorPubKeys
                | RequestKind::ListPendingTx
                | RequestKind::ListRecipient
                | RequestKind::ListAccountLevelRules
        )
    }

    /// Administrative mutations (rules, groups, keys, recipients).
    ///
    /// These serialize per family. Queries and pending-transaction
    /// updates rely on ledger versioning instead.
    pub fn is_administrative(&self) -> bool {
        self.is_mutation()
            && !matches!(
                self,
                RequestKind::QueryAuth | RequestKind::AddSigTx | RequestKind::ClosePendingTx
            )
    }
}
