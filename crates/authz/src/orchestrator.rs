//! Authorization query orchestrator
//!
//! Fetches the rules that apply to an initiator, evaluates them in
//! `generic ++ specific` order and turns the outcomes into a decision:
//! any deny wins, otherwise any quorum parks the query as a pending
//! transaction, otherwise the query is allowed.

use cosign_pending::{CreateOutcome, PendingMachine};
use cosign_rules::{merge_and_resolve, Outcome, RuleEvaluator, Variable};
use std::sync::Arc;

use crate::error::{AuthzError, AuthzResult};
use crate::initiator::{require, InitiatorStore};
use crate::query::{AuthQuery, Decision};

/// Bound to `RuleType` while evaluating group and account-level rules
pub const GENERIC_RULE_TYPE: &str = "generic";
/// Bound to `RuleType` while evaluating the initiator's own rules
pub const SPECIFIC_RULE_TYPE: &str = "specific";

pub struct Orchestrator {
    initiators: Arc<InitiatorStore>,
    pending: Arc<PendingMachine>,
}

impl Orchestrator {
    pub fn new(initiators: Arc<InitiatorStore>, pending: Arc<PendingMachine>) -> Self {
        Self {
            initiators,
            pending,
        }
    }

    pub async fn query_authorization(&self, query: &AuthQuery) -> AuthzResult<Decision> {
        require("sourceAccount", &query.source_account)?;
        require("initiator", &query.initiator)?;
        // the reserved group holds account-level rules, not an initiator
        if query.initiator == self.initiators.account_level_group() {
            return Err(AuthzError::ReservedGroup(query.initiator.clone()));
        }

        let (generic, specific) = self
            .initiators
            .rules_for(&query.source_account, &query.initiator)
            .await?;
        let generic_count = generic.len();
        let rules = merge_and_resolve(generic, specific);

        let base = query.to_context();
        let mut violated = Vec::new();
        let mut quorums = Vec::new();

        for (i, rule) in rules.iter().enumerate() {
            let rule_type = if i < generic_count {
                GENERIC_RULE_TYPE
            } else {
                SPECIFIC_RULE_TYPE
            };
            let ctx = base
                .clone()
                .with(Variable::Rule, rule.hash.as_str())
                .with(Variable::RuleType, rule_type);

            match RuleEvaluator::evaluate(rule, &ctx)? {
                Outcome::NoAction => {}
                Outcome::Deny => violated.push(rule.violation()),
                Outcome::QuorumRequired(quorum) => quorums.push(quorum),
            }
        }

        if !violated.is_empty() {
            tracing::warn!(
                account = %query.source_account,
                initiator = %query.initiator,
                violations = violated.len(),
                "query denied"
            );
            return Ok(Decision::Deny {
                violated_rules: violated,
            });
        }

        if quorums.is_empty() {
            tracing::debug!(account = %query.source_account, initiator = %query.initiator, "query allowed");
            return Ok(Decision::Allow);
        }

        let body = query
            .to_body()
            .map_err(|e| AuthzError::InvalidPayload(e.to_string()))?;
        let outcome = self
            .pending
            .create(&query.source_account, &query.initiator, &body, &quorums)
            .await?;

        Ok(match outcome {
            CreateOutcome::Created(transaction_id) | CreateOutcome::Existing(transaction_id) => {
                tracing::info!(
                    account = %query.source_account,
                    initiator = %query.initiator,
                    transaction_id = %transaction_id,
                    "query pending"
                );
                Decision::Pending { transaction_id }
            }
            CreateOutcome::SatisfiedByInitiator => Decision::Allow,
        })
    }
}
