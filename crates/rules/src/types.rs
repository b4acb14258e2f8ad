//! Rule types: variables, values, outcomes and the stored rule itself

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum_macros::{Display, EnumIter, EnumString};

use crate::error::{RuleError, RuleResult};
use crate::parser::{self, Expr};

/// Literal yielded by an untriggered rule
pub const NO_ACTION: &str = "no-action";
/// Older spelling of `NO_ACTION`, still accepted
pub const NO_ACTION_ALIAS: &str = "nil";
/// Literal yielded by a denying rule
pub const DENY: &str = "deny";

/// The closed set of names a rule expression may reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter)]
pub enum Variable {
    Action,
    Amount,
    Balance,
    DestAccount,
    Initiator,
    Recipient,
    Rule,
    RuleType,
    SourceAccount,
}

/// Runtime value of an expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Number(Decimal),
    Str(String),
    Bool(bool),
    /// `(min, "ID1,ID2")` or `NofM(min, "ID1,ID2")`
    Quorum { min: Decimal, signers: String },
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Bool(_) => "bool",
            Value::Quorum { .. } => "quorum",
        }
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Value::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

/// Variable bindings a rule is evaluated against
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleContext {
    bindings: HashMap<Variable, Value>,
}

impl RuleContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a variable (builder style)
    pub fn with(mut self, variable: Variable, value: impl Into<Value>) -> Self {
        self.bindings.insert(variable, value.into());
        self
    }

    pub fn bind(&mut self, variable: Variable, value: impl Into<Value>) {
        self.bindings.insert(variable, value.into());
    }

    pub fn get(&self, variable: Variable) -> Option<&Value> {
        self.bindings.get(&variable)
    }
}

/// N-of-M sign-off demanded by a triggered rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quorum {
    /// Signatures still required from `signers`
    pub min_signers: u32,
    /// Eligible initiator ids, trimmed and de-duplicated in order
    pub signers: Vec<String>,
}

impl Quorum {
    /// Build from the raw parts of a quorum descriptor
    pub fn from_parts(min: Decimal, signer_csv: &str) -> RuleResult<Self> {
        if !min.fract().is_zero() {
            return Err(RuleError::InvalidQuorum(format!(
                "minimum signers must be an integer, got {}",
                min
            )));
        }
        let min_signers = min
            .to_u32()
            .filter(|n| *n >= 1)
            .ok_or_else(|| {
                RuleError::InvalidQuorum(format!("minimum signers must be at least 1, got {}", min))
            })?;

        let mut signers: Vec<String> = Vec::new();
        for id in signer_csv.split(',').map(str::trim).filter(|id| !id.is_empty()) {
            if !signers.iter().any(|s| s == id) {
                signers.push(id.to_string());
            }
        }

        if signers.is_empty() {
            return Err(RuleError::InvalidQuorum("signer list is empty".to_string()));
        }
        if min_signers as usize > signers.len() {
            return Err(RuleError::InvalidQuorum(format!(
                "{} signatures required but only {} signers listed",
                min_signers,
                signers.len()
            )));
        }

        Ok(Self {
            min_signers,
            signers,
        })
    }

    /// Signers as a comma-separated list
    pub fn signer_csv(&self) -> String {
        self.signers.join(",")
    }
}

/// Result of evaluating one rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    NoAction,
    Deny,
    QuorumRequired(Quorum),
}

impl Outcome {
    pub fn is_deny(&self) -> bool {
        matches!(self, Outcome::Deny)
    }

    pub fn quorum(&self) -> Option<&Quorum> {
        match self {
            Outcome::QuorumRequired(q) => Some(q),
            _ => None,
        }
    }
}

/// A validated rule as stored in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    #[serde(rename = "rule")]
    pub expression: String,
    #[serde(rename = "rulehash")]
    pub hash: String,
}

impl Rule {
    /// Validate an expression and derive its hash.
    ///
    /// The expression must parse, reference only known variables, be a
    /// ternary at the top level and have a no-action branch. Literal quorum
    /// descriptors are checked here too.
    pub fn new(expression: impl Into<String>) -> RuleResult<Self> {
        let expression = expression.into();
        let ast = parser::parse(&expression)?;

        let Expr::Ternary {
            then, otherwise, ..
        } = &ast
        else {
            return Err(RuleError::NotTernary);
        };

        if !is_no_action(then) && !is_no_action(otherwise) {
            return Err(RuleError::MissingNoActionBranch);
        }
        validate_consequence(then)?;
        validate_consequence(otherwise)?;

        let hash = cosign_core::rule_hash(&expression);
        Ok(Self { expression, hash })
    }

    /// `hash:expression`, the form reported for violated rules
    pub fn violation(&self) -> String {
        format!("{}:{}", self.hash, self.expression)
    }
}

pub(crate) fn is_no_action_literal(s: &str) -> bool {
    s == NO_ACTION || s == NO_ACTION_ALIAS
}

fn is_no_action(expr: &Expr) -> bool {
    matches!(expr, Expr::Str(s) if is_no_action_literal(s))
}

fn validate_consequence(expr: &Expr) -> RuleResult<()> {
    match expr {
        Expr::Str(s) if is_no_action_literal(s) || s == DENY => Ok(()),
        Expr::Str(s) => Err(RuleError::BadConsequence(format!("unknown literal '{}'", s))),
        Expr::Quorum { min, signers } => match (min.as_ref(), signers.as_ref()) {
            (Expr::Number(n), Expr::Str(csv)) => Quorum::from_parts(*n, csv).map(|_| ()),
            (Expr::Str(_), _) | (Expr::Bool(_), _) | (_, Expr::Number(_)) | (_, Expr::Bool(_)) => {
                Err(RuleError::InvalidQuorum(
                    "expected (number, \"signer list\")".to_string(),
                ))
            }
            // computed parts are checked at evaluation
            _ => Ok(()),
        },
        Expr::Ternary {
            then, otherwise, ..
        } => {
            validate_consequence(then)?;
            validate_consequence(otherwise)
        }
        other => Err(RuleError::BadConsequence(format!(
            "expected \"deny\", \"no-action\" or a quorum, got {}",
            other.describe()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_variable_names_are_closed_set() {
        let names: Vec<String> = Variable::iter().map(|v| v.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "Action",
                "Amount",
                "Balance",
                "DestAccount",
                "Initiator",
                "Recipient",
                "Rule",
                "RuleType",
                "SourceAccount"
            ]
        );
        assert!(Variable::from_str("amount").is_err());
        assert!(Variable::from_str("Fee").is_err());
    }

    #[test]
    fn test_new_rule_scenario_expressions() {
        let rule = Rule::new(r#"Amount < 13000 ? "no-action" : "deny""#).unwrap();
        assert_eq!(rule.hash, "c760cd777c07c5e4cea8");

        Rule::new(r#"Amount > 10000 ? (2, "ID12345,CD34YG4,EF56ZH5") : "no-action""#).unwrap();
        Rule::new("Amount > 10000 ? NofM(2, 'ID12345, CD34YG4, EF56ZH5') : 'nil'").unwrap();
    }

    #[test]
    fn test_new_rule_rejects_unknown_variable() {
        let err = Rule::new(r#"Fee > 10 ? "deny" : "no-action""#).unwrap_err();
        assert_eq!(err, RuleError::UnknownVariable("Fee".to_string()));
    }

    #[test]
    fn test_new_rule_rejects_non_ternary() {
        assert_eq!(Rule::new("Amount > 10").unwrap_err(), RuleError::NotTernary);
        assert_eq!(Rule::new(r#""deny""#).unwrap_err(), RuleError::NotTernary);
    }

    #[test]
    fn test_new_rule_rejects_oversized_expressions() {
        let nested = format!(
            r#"{}Amount{} > 10 ? "deny" : "no-action""#,
            "(".repeat(10_000),
            ")".repeat(10_000)
        );
        assert!(matches!(Rule::new(nested).unwrap_err(), RuleError::TooLong { .. }));

        let nested = format!(
            r#"{}Amount{} > 10 ? "deny" : "no-action""#,
            "(".repeat(100),
            ")".repeat(100)
        );
        assert!(matches!(Rule::new(nested).unwrap_err(), RuleError::TooDeep(_)));
    }

    #[test]
    fn test_new_rule_requires_no_action_branch() {
        let err = Rule::new(r#"Amount > 10 ? "deny" : "deny""#).unwrap_err();
        assert_eq!(err, RuleError::MissingNoActionBranch);
    }

    #[test]
    fn test_new_rule_rejects_bad_consequence() {
        assert!(matches!(
            Rule::new(r#"Amount > 10 ? "approve" : "no-action""#),
            Err(RuleError::BadConsequence(_))
        ));
        assert!(matches!(
            Rule::new(r#"Amount > 10 ? Amount : "no-action""#),
            Err(RuleError::BadConsequence(_))
        ));
    }

    #[test]
    fn test_new_rule_rejects_bad_literal_quorum() {
        assert!(matches!(
            Rule::new(r#"Amount > 10 ? (4, "A,B,C") : "no-action""#),
            Err(RuleError::InvalidQuorum(_))
        ));
        assert!(matches!(
            Rule::new(r#"Amount > 10 ? (0, "A,B") : "no-action""#),
            Err(RuleError::InvalidQuorum(_))
        ));
        assert!(matches!(
            Rule::new(r#"Amount > 10 ? ("2", "A,B") : "no-action""#),
            Err(RuleError::InvalidQuorum(_))
        ));
    }

    #[test]
    fn test_quorum_from_parts_trims_and_dedupes() {
        let quorum = Quorum::from_parts(dec!(2), " A, B ,A,, C").unwrap();
        assert_eq!(quorum.min_signers, 2);
        assert_eq!(quorum.signers, vec!["A", "B", "C"]);
        assert_eq!(quorum.signer_csv(), "A,B,C");
    }

    #[test]
    fn test_quorum_rejects_fractional_min() {
        assert!(Quorum::from_parts(dec!(1.5), "A,B").is_err());
        assert!(Quorum::from_parts(dec!(-1), "A,B").is_err());
        assert!(Quorum::from_parts(dec!(1), " , ").is_err());
    }

    #[test]
    fn test_rule_serde_field_names() {
        let rule = Rule::new(r#"Amount < 13000 ? "no-action" : "deny""#).unwrap();
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["rulehash"], "c760cd777c07c5e4cea8");
        assert_eq!(json["rule"], r#"Amount < 13000 ? "no-action" : "deny""#);
    }

    #[test]
    fn test_violation_format() {
        let rule = Rule::new(r#"Amount < 13000 ? "no-action" : "deny""#).unwrap();
        assert_eq!(
            rule.violation(),
            r#"c760cd777c07c5e4cea8:Amount < 13000 ? "no-action" : "deny""#
        );
    }

    #[test]
    fn test_context_builder() {
        let ctx = RuleContext::new()
            .with(Variable::Amount, dec!(5))
            .with(Variable::Initiator, "ID12345");
        assert_eq!(ctx.get(Variable::Amount), Some(&Value::Number(dec!(5))));
        assert_eq!(ctx.get(Variable::Balance), None);
    }
}
