//! Typed requests and responses
//!
//! One variant per request kind. `Request::decode` parses an envelope
//! payload by its kind; `EnvelopeBody` lets a request be sealed into a
//! signed envelope.

use cosign_core::RequestKind;
use cosign_gate::{EnvelopeBody, GateResult};
use cosign_pending::PendingTransaction;
use cosign_rules::Rule;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{AuthzError, AuthzResult};
use crate::query::{AuthQuery, Decision};

// === Payloads ===

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatorPayload {
    pub initiator: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulePayload {
    pub initiator: String,
    pub rule: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleHashPayload {
    pub initiator: String,
    pub rule_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPayload {
    pub initiator: String,
    pub group: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubKeysPayload {
    pub initiator: String,
    pub public_keys: Vec<String>,
}

/// Identifies a pending transaction; the key is the envelope signer's
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTxPayload {
    pub initiator: String,
    pub transaction_id: String,
}

/// A signature over a pending transaction's stored body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSigPayload {
    pub initiator: String,
    pub transaction_id: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientPayload {
    pub recipient: String,
    pub dest_account: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientQuery {
    pub recipient: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRulePayload {
    pub rule: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRuleHashPayload {
    pub rule_hash: String,
}

// === Requests ===

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    SetInitiatorRule(RulePayload),
    DeleteInitiatorRule(RuleHashPayload),
    ListInitiatorRules(InitiatorPayload),
    AddInitiatorToGroup(GroupPayload),
    RemoveInitiatorFromGroup(GroupPayload),
    ListInitiatorGroups(InitiatorPayload),
    SetInitiatorPubKeys(PubKeysPayload),
    DeleteInitiatorPubKeys(PubKeysPayload),
    ListInitiatorPubKeys(InitiatorPayload),
    QueryAuth(AuthQuery),
    ClosePendingTx(PendingTxPayload),
    AddSigTx(AddSigPayload),
    ListPendingTx(InitiatorPayload),
    SetRecipient(RecipientPayload),
    RemoveRecipient(RecipientPayload),
    ListRecipient(RecipientQuery),
    SetAccountLevelRule(AccountRulePayload),
    DeleteAccountLevelRule(AccountRuleHashPayload),
    ListAccountLevelRules,
}

fn initiator(initiator: impl Into<String>) -> InitiatorPayload {
    InitiatorPayload {
        initiator: initiator.into(),
    }
}

impl Request {
    pub fn kind(&self) -> RequestKind {
        match self {
            Request::SetInitiatorRule(_) => RequestKind::SetInitiatorRule,
            Request::DeleteInitiatorRule(_) => RequestKind::DeleteInitiatorRule,
            Request::ListInitiatorRules(_) => RequestKind::ListInitiatorRules,
            Request::AddInitiatorToGroup(_) => RequestKind::AddInitiatorToGroup,
            Request::RemoveInitiatorFromGroup(_) => RequestKind::RemoveInitiatorFromGroup,
            Request::ListInitiatorGroups(_) => RequestKind::ListInitiatorGroups,
            Request::SetInitiatorPubKeys(_) => RequestKind::SetInitiatorPubKeys,
            Request::DeleteInitiatorPubKeys(_) => RequestKind::DeleteInitiatorPubKeys,
            Request::ListInitiatorPubKeys(_) => RequestKind::ListInitiatorPubKeys,
            Request::QueryAuth(_) => RequestKind::QueryAuth,
            Request::ClosePendingTx(_) => RequestKind::ClosePendingTx,
            Request::AddSigTx(_) => RequestKind::AddSigTx,
            Request::ListPendingTx(_) => RequestKind::ListPendingTx,
            Request::SetRecipient(_) => RequestKind::SetRecipient,
            Request::RemoveRecipient(_) => RequestKind::RemoveRecipient,
            Request::ListRecipient(_) => RequestKind::ListRecipient,
            Request::SetAccountLevelRule(_) => RequestKind::SetAccountLevelRule,
            Request::DeleteAccountLevelRule(_) => RequestKind::DeleteAccountLevelRule,
            Request::ListAccountLevelRules => RequestKind::ListAccountLevelRules,
        }
    }

    /// Parse a payload according to its kind tag
    pub fn decode(kind: RequestKind, payload: &str) -> AuthzResult<Self> {
        Ok(match kind {
            RequestKind::SetInitiatorRule => Request::SetInitiatorRule(parse(kind, payload)?),
            RequestKind::DeleteInitiatorRule => Request::DeleteInitiatorRule(parse(kind, payload)?),
            RequestKind::ListInitiatorRules => Request::ListInitiatorRules(parse(kind, payload)?),
            RequestKind::AddInitiatorToGroup => Request::AddInitiatorToGroup(parse(kind, payload)?),
            RequestKind::RemoveInitiatorFromGroup => {
                Request::RemoveInitiatorFromGroup(parse(kind, payload)?)
            }
            RequestKind::ListInitiatorGroups => Request::ListInitiatorGroups(parse(kind, payload)?),
            RequestKind::SetInitiatorPubKeys => Request::SetInitiatorPubKeys(parse(kind, payload)?),
            RequestKind::DeleteInitiatorPubKeys => {
                Request::DeleteInitiatorPubKeys(parse(kind, payload)?)
            }
            RequestKind::ListInitiatorPubKeys => Request::ListInitiatorPubKeys(parse(kind, payload)?),
            RequestKind::QueryAuth => Request::QueryAuth(parse(kind, payload)?),
            RequestKind::ClosePendingTx => Request::ClosePendingTx(parse(kind, payload)?),
            RequestKind::AddSigTx => Request::AddSigTx(parse(kind, payload)?),
            RequestKind::ListPendingTx => Request::ListPendingTx(parse(kind, payload)?),
            RequestKind::SetRecipient => Request::SetRecipient(parse(kind, payload)?),
            RequestKind::RemoveRecipient => Request::RemoveRecipient(parse(kind, payload)?),
            RequestKind::ListRecipient => Request::ListRecipient(parse(kind, payload)?),
            RequestKind::SetAccountLevelRule => Request::SetAccountLevelRule(parse(kind, payload)?),
            RequestKind::DeleteAccountLevelRule => {
                Request::DeleteAccountLevelRule(parse(kind, payload)?)
            }
            RequestKind::ListAccountLevelRules => Request::ListAccountLevelRules,
        })
    }

    /// Serialized payload for this request
    pub fn to_payload(&self) -> serde_json::Result<String> {
        match self {
            Request::SetInitiatorRule(p) => serde_json::to_string(p),
            Request::DeleteInitiatorRule(p) => serde_json::to_string(p),
            Request::ListInitiatorRules(p)
            | Request::ListInitiatorGroups(p)
            | Request::ListInitiatorPubKeys(p)
            | Request::ListPendingTx(p) => serde_json::to_string(p),
            Request::AddInitiatorToGroup(p) | Request::RemoveInitiatorFromGroup(p) => {
                serde_json::to_string(p)
            }
            Request::SetInitiatorPubKeys(p) | Request::DeleteInitiatorPubKeys(p) => {
                serde_json::to_string(p)
            }
            Request::QueryAuth(p) => p.to_body(),
            Request::ClosePendingTx(p) => serde_json::to_string(p),
            Request::AddSigTx(p) => serde_json::to_string(p),
            Request::SetRecipient(p) | Request::RemoveRecipient(p) => serde_json::to_string(p),
            Request::ListRecipient(p) => serde_json::to_string(p),
            Request::SetAccountLevelRule(p) => serde_json::to_string(p),
            Request::DeleteAccountLevelRule(p) => serde_json::to_string(p),
            Request::ListAccountLevelRules => Ok("{}".to_string()),
        }
    }

    // === Constructors ===

    pub fn set_initiator_rule(initiator: impl Into<String>, rule: impl Into<String>) -> Self {
        Request::SetInitiatorRule(RulePayload {
            initiator: initiator.into(),
            rule: rule.into(),
        })
    }

    pub fn delete_initiator_rule(initiator: impl Into<String>, rule_hash: impl Into<String>) -> Self {
        Request::DeleteInitiatorRule(RuleHashPayload {
            initiator: initiator.into(),
            rule_hash: rule_hash.into(),
        })
    }

    pub fn list_initiator_rules(initiator_id: impl Into<String>) -> Self {
        Request::ListInitiatorRules(initiator(initiator_id))
    }

    pub fn add_initiator_to_group(initiator: impl Into<String>, group: impl Into<String>) -> Self {
        Request::AddInitiatorToGroup(GroupPayload {
            initiator: initiator.into(),
            group: group.into(),
        })
    }

    pub fn remove_initiator_from_group(initiator: impl Into<String>, group: impl Into<String>) -> Self {
        Request::RemoveInitiatorFromGroup(GroupPayload {
            initiator: initiator.into(),
            group: group.into(),
        })
    }

    pub fn list_initiator_groups(initiator_id: impl Into<String>) -> Self {
        Request::ListInitiatorGroups(initiator(initiator_id))
    }

    pub fn set_initiator_pub_keys(initiator: impl Into<String>, public_keys: Vec<String>) -> Self {
        Request::SetInitiatorPubKeys(PubKeysPayload {
            initiator: initiator.into(),
            public_keys,
        })
    }

    pub fn delete_initiator_pub_keys(initiator: impl Into<String>, public_keys: Vec<String>) -> Self {
        Request::DeleteInitiatorPubKeys(PubKeysPayload {
            initiator: initiator.into(),
            public_keys,
        })
    }

    pub fn list_initiator_pub_keys(initiator_id: impl Into<String>) -> Self {
        Request::ListInitiatorPubKeys(initiator(initiator_id))
    }

    pub fn query_auth(query: AuthQuery) -> Self {
        Request::QueryAuth(query)
    }

    pub fn close_pending_tx(initiator: impl Into<String>, transaction_id: impl Into<String>) -> Self {
        Request::ClosePendingTx(PendingTxPayload {
            initiator: initiator.into(),
            transaction_id: transaction_id.into(),
        })
    }

    pub fn add_sig_tx(
        initiator: impl Into<String>,
        transaction_id: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        Request::AddSigTx(AddSigPayload {
            initiator: initiator.into(),
            transaction_id: transaction_id.into(),
            signature: signature.into(),
        })
    }

    pub fn list_pending_tx(initiator_id: impl Into<String>) -> Self {
        Request::ListPendingTx(initiator(initiator_id))
    }

    pub fn set_recipient(recipient: impl Into<String>, dest_account: impl Into<String>) -> Self {
        Request::SetRecipient(RecipientPayload {
            recipient: recipient.into(),
            dest_account: dest_account.into(),
        })
    }

    pub fn remove_recipient(recipient: impl Into<String>, dest_account: impl Into<String>) -> Self {
        Request::RemoveRecipient(RecipientPayload {
            recipient: recipient.into(),
            dest_account: dest_account.into(),
        })
    }

    pub fn list_recipient(recipient: impl Into<String>) -> Self {
        Request::ListRecipient(RecipientQuery {
            recipient: recipient.into(),
        })
    }

    pub fn set_account_level_rule(rule: impl Into<String>) -> Self {
        Request::SetAccountLevelRule(AccountRulePayload { rule: rule.into() })
    }

    pub fn delete_account_level_rule(rule_hash: impl Into<String>) -> Self {
        Request::DeleteAccountLevelRule(AccountRuleHashPayload {
            rule_hash: rule_hash.into(),
        })
    }

    pub fn list_account_level_rules() -> Self {
        Request::ListAccountLevelRules
    }
}

fn parse<T: DeserializeOwned>(kind: RequestKind, payload: &str) -> AuthzResult<T> {
    serde_json::from_str(payload)
        .map_err(|e| AuthzError::InvalidPayload(format!("{} payload: {}", kind, e)))
}

impl EnvelopeBody for Request {
    fn kind(&self) -> RequestKind {
        Request::kind(self)
    }

    fn encode_payload(&self) -> GateResult<String> {
        Ok(self.to_payload()?)
    }
}

// === Responses ===

/// Result of a signature submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SignatureStatus {
    /// Quorum met; the transaction is allowed
    Allow,
    StillPending { remaining: u32 },
}

/// What a processed request produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    /// Mutation committed
    Committed,
    RuleSet { rule_hash: String },
    Rules(Vec<Rule>),
    Groups(Vec<String>),
    PublicKeys(Vec<String>),
    Decision(Decision),
    Signature(SignatureStatus),
    PendingTransactions(Vec<PendingTransaction>),
    Recipients(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use strum::IntoEnumIterator;

    fn samples() -> Vec<Request> {
        vec![
            Request::set_initiator_rule("ID12345", r#"Amount < 13000 ? "no-action" : "deny""#),
            Request::delete_initiator_rule("ID12345", "c760cd777c07c5e4cea8"),
            Request::list_initiator_rules("ID12345"),
            Request::add_initiator_to_group("ID12345", "tellers"),
            Request::remove_initiator_from_group("ID12345", "tellers"),
            Request::list_initiator_groups("ID12345"),
            Request::set_initiator_pub_keys("ID12345", vec!["02aa".into()]),
            Request::delete_initiator_pub_keys("ID12345", vec!["02aa".into()]),
            Request::list_initiator_pub_keys("ID12345"),
            Request::query_auth(AuthQuery::new("AB12XF3", "ID12345", "withdraw", dec!(11000))),
            Request::close_pending_tx("ID12345", "ab".repeat(30)),
            Request::add_sig_tx("CD34YG4", "ab".repeat(30), "00"),
            Request::list_pending_tx("CD34YG4"),
            Request::set_recipient("Bob", "ZZ0001"),
            Request::remove_recipient("Bob", "ZZ0001"),
            Request::list_recipient("Bob"),
            Request::set_account_level_rule(r#"Amount > 1 ? "deny" : "no-action""#),
            Request::delete_account_level_rule("c760cd777c07c5e4cea8"),
            Request::list_account_level_rules(),
        ]
    }

    #[test]
    fn test_every_kind_has_a_variant() {
        let kinds: Vec<RequestKind> = samples().iter().map(Request::kind).collect();
        assert_eq!(kinds, RequestKind::iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_decode_matches_encoding() {
        for request in samples() {
            let payload = request.to_payload().unwrap();
            assert_eq!(Request::decode(request.kind(), &payload).unwrap(), request);
        }
    }

    #[test]
    fn test_payload_field_names() {
        let payload = Request::add_sig_tx("CD34YG4", "t", "s").to_payload().unwrap();
        assert_eq!(
            payload,
            r#"{"initiator":"CD34YG4","transactionId":"t","signature":"s"}"#
        );
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        let err = Request::decode(RequestKind::SetInitiatorRule, r#"{"initiator":"ID12345"}"#)
            .unwrap_err();
        assert!(matches!(err, AuthzError::InvalidPayload(ref m) if m.contains("set_initiator_rule")));
        assert!(Request::decode(RequestKind::QueryAuth, "not json").is_err());
    }

    #[test]
    fn test_response_serialization() {
        let json = serde_json::to_value(Response::Signature(SignatureStatus::Allow)).unwrap();
        assert_eq!(json["signature"]["action"], "allow");

        let json = serde_json::to_value(Response::Decision(Decision::Pending {
            transaction_id: "t".into(),
        }))
        .unwrap();
        assert_eq!(json["decision"]["action"], "pending");
        assert_eq!(json["decision"]["transactionId"], "t");
    }
}
