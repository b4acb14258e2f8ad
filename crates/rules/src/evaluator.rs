//! Rule evaluator - evaluates rules against a transaction context
//!
//! Evaluation is a pure function of the rule text and the bindings.

use rust_decimal::Decimal;
use std::cmp::Ordering;

use crate::error::{RuleError, RuleResult};
use crate::parser::{self, BinaryOp, Expr, UnaryOp};
use crate::types::{is_no_action_literal, Outcome, Quorum, Rule, RuleContext, Value, DENY};

/// Rule evaluator
pub struct RuleEvaluator;

impl RuleEvaluator {
    /// Parse and evaluate a rule against the given bindings
    pub fn evaluate(rule: &Rule, ctx: &RuleContext) -> RuleResult<Outcome> {
        let expr = parser::parse(&rule.expression)?;
        let value = Self::eval_expr(&expr, ctx)?;
        Self::interpret(value)
    }

    /// Map the final value of a rule to an outcome
    pub fn interpret(value: Value) -> RuleResult<Outcome> {
        match value {
            Value::Str(s) if is_no_action_literal(&s) => Ok(Outcome::NoAction),
            Value::Str(s) if s == DENY => Ok(Outcome::Deny),
            Value::Quorum { min, signers } => {
                Quorum::from_parts(min, &signers).map(Outcome::QuorumRequired)
            }
            other => Err(RuleError::BadConsequence(format!(
                "rule produced {} value",
                other.type_name()
            ))),
        }
    }

    /// Evaluate one expression node
    pub fn eval_expr(expr: &Expr, ctx: &RuleContext) -> RuleResult<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Variable(v) => ctx.get(*v).cloned().ok_or(RuleError::Unbound(*v)),
            Expr::Unary { op, operand } => {
                let value = Self::eval_expr(operand, ctx)?;
                match (op, value) {
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
                    (op, other) => Err(RuleError::Type(format!(
                        "cannot apply {:?} to {}",
                        op,
                        other.type_name()
                    ))),
                }
            }
            Expr::Binary { op, left, right } => match op {
                BinaryOp::And => {
                    if !Self::eval_bool(left, ctx)? {
                        return Ok(Value::Bool(false));
                    }
                    Ok(Value::Bool(Self::eval_bool(right, ctx)?))
                }
                BinaryOp::Or => {
                    if Self::eval_bool(left, ctx)? {
                        return Ok(Value::Bool(true));
                    }
                    Ok(Value::Bool(Self::eval_bool(right, ctx)?))
                }
                _ => {
                    let left = Self::eval_expr(left, ctx)?;
                    let right = Self::eval_expr(right, ctx)?;
                    binary(*op, left, right)
                }
            },
            Expr::Ternary {
                guard,
                then,
                otherwise,
            } => {
                if Self::eval_bool(guard, ctx)? {
                    Self::eval_expr(then, ctx)
                } else {
                    Self::eval_expr(otherwise, ctx)
                }
            }
            Expr::Quorum { min, signers } => {
                let min = match Self::eval_expr(min, ctx)? {
                    Value::Number(n) => n,
                    other => {
                        return Err(RuleError::Type(format!(
                            "quorum minimum must be a number, got {}",
                            other.type_name()
                        )))
                    }
                };
                let signers = match Self::eval_expr(signers, ctx)? {
                    Value::Str(s) => s,
                    other => {
                        return Err(RuleError::Type(format!(
                            "quorum signers must be a string, got {}",
                            other.type_name()
                        )))
                    }
                };
                Ok(Value::Quorum { min, signers })
            }
        }
    }

    fn eval_bool(expr: &Expr, ctx: &RuleContext) -> RuleResult<bool> {
        match Self::eval_expr(expr, ctx)? {
            Value::Bool(b) => Ok(b),
            other => Err(RuleError::Type(format!(
                "expected bool, got {}",
                other.type_name()
            ))),
        }
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> RuleResult<Value> {
    match (op, &left, &right) {
        (BinaryOp::Eq, _, _) => Ok(Value::Bool(equal(&left, &right)?)),
        (BinaryOp::NotEq, _, _) => Ok(Value::Bool(!equal(&left, &right)?)),
        (BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge, _, _) => {
            let ordering = order(&left, &right)?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
        (
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem,
            Value::Number(a),
            Value::Number(b),
        ) => arithmetic(op, *a, *b).map(Value::Number),
        _ => Err(RuleError::Type(format!(
            "cannot apply {:?} to {} and {}",
            op,
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn arithmetic(op: BinaryOp, a: Decimal, b: Decimal) -> RuleResult<Decimal> {
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div if b.is_zero() => {
            return Err(RuleError::Arithmetic("division by zero".to_string()))
        }
        BinaryOp::Div => a.checked_div(b),
        BinaryOp::Rem if b.is_zero() => {
            return Err(RuleError::Arithmetic("modulo by zero".to_string()))
        }
        BinaryOp::Rem => a.checked_rem(b),
        _ => None,
    };
    result.ok_or_else(|| RuleError::Arithmetic(format!("overflow in {:?}", op)))
}

fn equal(left: &Value, right: &Value) -> RuleResult<bool> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(a == b),
        (Value::Str(a), Value::Str(b)) => Ok(a == b),
        (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
        _ => Err(RuleError::Type(format!(
            "cannot compare {} with {}",
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn order(left: &Value, right: &Value) -> RuleResult<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        _ => Err(RuleError::Type(format!(
            "cannot order {} and {}",
            left.type_name(),
            right.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Variable;
    use rust_decimal_macros::dec;

    fn amount_ctx(amount: Decimal) -> RuleContext {
        RuleContext::new()
            .with(Variable::Amount, amount)
            .with(Variable::Initiator, "ID12345")
            .with(Variable::Action, "withdraw")
    }

    fn eval(expression: &str, ctx: &RuleContext) -> RuleResult<Outcome> {
        RuleEvaluator::evaluate(&Rule::new(expression).unwrap(), ctx)
    }

    #[test]
    fn test_threshold_rule_allows_and_denies() {
        let rule = r#"Amount < 13000 ? "no-action" : "deny""#;
        assert_eq!(eval(rule, &amount_ctx(dec!(11000))).unwrap(), Outcome::NoAction);
        assert_eq!(eval(rule, &amount_ctx(dec!(15000))).unwrap(), Outcome::Deny);
        assert_eq!(eval(rule, &amount_ctx(dec!(13000))).unwrap(), Outcome::Deny);
    }

    #[test]
    fn test_quorum_rule() {
        let rule = r#"Amount > 10000 ? (2, "ID12345,CD34YG4,EF56ZH5") : "no-action""#;
        let outcome = eval(rule, &amount_ctx(dec!(11000))).unwrap();
        assert_eq!(
            outcome,
            Outcome::QuorumRequired(Quorum {
                min_signers: 2,
                signers: vec!["ID12345".into(), "CD34YG4".into(), "EF56ZH5".into()],
            })
        );
        assert_eq!(eval(rule, &amount_ctx(dec!(9000))).unwrap(), Outcome::NoAction);
    }

    #[test]
    fn test_legacy_nil_sentinel() {
        let rule = "Amount > 10000 ? NofM(1, 'CD34YG4') : 'nil'";
        assert_eq!(eval(rule, &amount_ctx(dec!(1))).unwrap(), Outcome::NoAction);
        assert!(eval(rule, &amount_ctx(dec!(20000))).unwrap().quorum().is_some());
    }

    #[test]
    fn test_evaluation_is_repeatable() {
        let rule = Rule::new(r#"Amount * 2 >= 100 && Action == "withdraw" ? "deny" : "no-action""#)
            .unwrap();
        let ctx = amount_ctx(dec!(50));
        let first = RuleEvaluator::evaluate(&rule, &ctx).unwrap();
        let second = RuleEvaluator::evaluate(&rule, &ctx).unwrap();
        assert_eq!(first, Outcome::Deny);
        assert_eq!(first, second);
    }

    #[test]
    fn test_unbound_variable() {
        let rule = r#"Balance < 100 ? "deny" : "no-action""#;
        assert_eq!(
            eval(rule, &amount_ctx(dec!(1))),
            Err(RuleError::Unbound(Variable::Balance))
        );
    }

    #[test]
    fn test_short_circuit_skips_unbound() {
        let rule = r#"Amount > 100 && Balance < 5 ? "deny" : "no-action""#;
        assert_eq!(eval(rule, &amount_ctx(dec!(1))).unwrap(), Outcome::NoAction);
    }

    #[test]
    fn test_string_comparison_and_concat() {
        let ctx = amount_ctx(dec!(1)).with(Variable::Recipient, "ACME");
        let rule = r#"Recipient + "-x" == "ACME-x" ? "deny" : "no-action""#;
        assert_eq!(eval(rule, &ctx).unwrap(), Outcome::Deny);
    }

    #[test]
    fn test_type_mismatch() {
        let rule = r#"Initiator > 5 ? "deny" : "no-action""#;
        assert!(matches!(
            eval(rule, &amount_ctx(dec!(1))),
            Err(RuleError::Type(_))
        ));
    }

    #[test]
    fn test_guard_must_be_bool() {
        let rule = Rule {
            expression: r#"Amount ? "deny" : "no-action""#.to_string(),
            hash: String::new(),
        };
        assert!(matches!(
            RuleEvaluator::evaluate(&rule, &amount_ctx(dec!(1))),
            Err(RuleError::Type(_))
        ));
    }

    #[test]
    fn test_division_by_zero() {
        let rule = r#"Amount / 0 > 1 ? "deny" : "no-action""#;
        assert!(matches!(
            eval(rule, &amount_ctx(dec!(1))),
            Err(RuleError::Arithmetic(_))
        ));
    }

    #[test]
    fn test_computed_quorum_checked_at_evaluation() {
        let rule = r#"Amount > 0 ? (Amount, "A,B") : "no-action""#;
        assert!(eval(rule, &amount_ctx(dec!(2))).unwrap().quorum().is_some());
        assert!(matches!(
            eval(rule, &amount_ctx(dec!(3))),
            Err(RuleError::InvalidQuorum(_))
        ));
    }

    #[test]
    fn test_unary_operators() {
        let rule = r#"!(Amount > -5) ? "deny" : "no-action""#;
        assert_eq!(eval(rule, &amount_ctx(dec!(-10))).unwrap(), Outcome::Deny);
        assert_eq!(eval(rule, &amount_ctx(dec!(0))).unwrap(), Outcome::NoAction);
    }

    #[test]
    fn test_interpret_rejects_other_values() {
        assert!(matches!(
            RuleEvaluator::interpret(Value::Bool(true)),
            Err(RuleError::BadConsequence(_))
        ));
        assert!(matches!(
            RuleEvaluator::interpret(Value::Str("approve".into())),
            Err(RuleError::BadConsequence(_))
        ));
    }
}
