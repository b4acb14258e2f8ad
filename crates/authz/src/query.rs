//! Authorization queries and decisions

use cosign_rules::{RuleContext, Variable};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A proposed transaction to authorize
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthQuery {
    pub source_account: String,
    pub initiator: String,
    pub action: String,
    pub amount: Decimal,
    #[serde(default)]
    pub recipient: String,
    #[serde(default)]
    pub dest_account: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<Decimal>,
}

impl AuthQuery {
    pub fn new(
        source_account: impl Into<String>,
        initiator: impl Into<String>,
        action: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            source_account: source_account.into(),
            initiator: initiator.into(),
            action: action.into(),
            amount,
            recipient: String::new(),
            dest_account: String::new(),
            balance: None,
        }
    }

    pub fn with_recipient(mut self, recipient: impl Into<String>, dest_account: impl Into<String>) -> Self {
        self.recipient = recipient.into();
        self.dest_account = dest_account.into();
        self
    }

    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.balance = Some(balance);
        self
    }

    /// Canonical serialized form: what gets stored and signed while pending
    pub fn to_body(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Bindings shared by every rule evaluated for this query
    pub fn to_context(&self) -> RuleContext {
        let mut ctx = RuleContext::new()
            .with(Variable::SourceAccount, self.source_account.as_str())
            .with(Variable::Initiator, self.initiator.as_str())
            .with(Variable::Action, self.action.as_str())
            .with(Variable::Amount, self.amount)
            .with(Variable::Recipient, self.recipient.as_str())
            .with(Variable::DestAccount, self.dest_account.as_str());
        if let Some(balance) = self.balance {
            ctx.bind(Variable::Balance, balance);
        }
        ctx
    }
}

/// Outcome of an authorization query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny {
        /// `hash:expression` of every denying rule
        #[serde(rename = "violatedRules")]
        violated_rules: Vec<String>,
    },
    Pending {
        #[serde(rename = "transactionId")]
        transaction_id: String,
    },
}

impl Decision {
    /// True when the query left a pending record behind
    pub fn is_pending(&self) -> bool {
        matches!(self, Decision::Pending { .. })
    }
}
