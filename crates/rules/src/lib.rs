//! Cosign Rules - guarded ternary rule expressions
//!
//! A rule is a ternary over a closed set of transaction variables:
//!
//! ```text
//! Amount < 13000 ? "no-action" : "deny"
//! Amount > 10000 ? (2, "ID12345,CD34YG4,EF56ZH5") : "no-action"
//! ```
//!
//! Evaluating it yields `Outcome::NoAction`, `Outcome::Deny` or
//! `Outcome::QuorumRequired`. Rules are validated when created, so a
//! stored rule always parses and references only known variables.

pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod types;

pub use error::{RuleError, RuleResult};
pub use evaluator::RuleEvaluator;
pub use types::{Outcome, Quorum, Rule, RuleContext, Value, Variable, DENY, NO_ACTION};

/// Order in which generic (group / account-level) and specific (initiator)
/// rules are evaluated: generic first, then specific.
///
/// This is an ordering policy only. Two rules with overlapping guards are
/// both evaluated and the caller aggregates their outcomes.
pub fn merge_and_resolve(generic: Vec<Rule>, specific: Vec<Rule>) -> Vec<Rule> {
    let mut merged = generic;
    merged.extend(specific);
    merged
}
