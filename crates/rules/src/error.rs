//! Rule errors

use thiserror::Error;

use crate::types::Variable;

/// Errors raised while creating or evaluating a rule
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    // === Lexing / parsing ===
    #[error("Unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("Unterminated string starting at position {0}")]
    UnterminatedString(usize),

    #[error("Invalid number literal: {0}")]
    InvalidNumber(String),

    #[error("Syntax error at position {pos}: {message}")]
    Syntax { pos: usize, message: String },

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Expression nests deeper than {0} levels")]
    TooDeep(usize),

    #[error("Expression is {len} characters long, limit is {max}")]
    TooLong { len: usize, max: usize },

    // === Rule shape ===
    #[error("Rule must have the form: guard ? consequence : \"no-action\"")]
    NotTernary,

    #[error("Rule has no \"no-action\" branch")]
    MissingNoActionBranch,

    #[error("Invalid consequence: {0}")]
    BadConsequence(String),

    #[error("Invalid quorum: {0}")]
    InvalidQuorum(String),

    // === Evaluation ===
    #[error("Variable {0} is not bound in the evaluation context")]
    Unbound(Variable),

    #[error("Type error: {0}")]
    Type(String),

    #[error("Arithmetic error: {0}")]
    Arithmetic(String),
}

pub type RuleResult<T> = Result<T, RuleError>;
