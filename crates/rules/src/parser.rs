//! Recursive-descent parser for rule expressions
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! ternary    := or ( "?" ternary ":" ternary )?
//! or         := and ( "||" and )*
//! and        := comparison ( "&&" comparison )*
//! comparison := additive ( ( "==" | "!=" | "<" | "<=" | ">" | ">=" ) additive )*
//! additive   := term ( ( "+" | "-" ) term )*
//! term       := unary ( ( "*" | "/" | "%" ) unary )*
//! unary      := ( "!" | "-" ) unary | primary
//! primary    := number | string | true | false | Variable
//!             | "NofM" "(" ternary "," ternary ")"
//!             | "(" ternary ")" | "(" ternary "," ternary ")"
//! ```

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::{RuleError, RuleResult};
use crate::lexer::{tokenize, Spanned, Token};
use crate::types::Variable;

/// Quorum constructor accepted in consequences
pub const QUORUM_FUNCTION: &str = "NofM";

/// Longest accepted expression, in characters
pub const MAX_EXPRESSION_LENGTH: usize = 4096;

/// Deepest accepted nesting of ternaries, groups and unary operators
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Parsed rule expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Number(Decimal),
    Str(String),
    Bool(bool),
    Variable(Variable),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Ternary {
        guard: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Quorum {
        min: Box<Expr>,
        signers: Box<Expr>,
    },
}

impl Expr {
    /// Short description used in error messages
    pub fn describe(&self) -> String {
        match self {
            Expr::Number(n) => format!("number {}", n),
            Expr::Str(s) => format!("string '{}'", s),
            Expr::Bool(b) => format!("bool {}", b),
            Expr::Variable(v) => format!("variable {}", v),
            Expr::Unary { .. } => "unary expression".to_string(),
            Expr::Binary { .. } => "binary expression".to_string(),
            Expr::Ternary { .. } => "ternary expression".to_string(),
            Expr::Quorum { .. } => "quorum".to_string(),
        }
    }
}

/// Parse a complete expression
pub fn parse(input: &str) -> RuleResult<Expr> {
    let len = input.chars().count();
    if len > MAX_EXPRESSION_LENGTH {
        return Err(RuleError::TooLong {
            len,
            max: MAX_EXPRESSION_LENGTH,
        });
    }

    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: len,
        depth: 0,
    };

    let expr = parser.ternary()?;
    if let Some(extra) = parser.peek() {
        return Err(RuleError::Syntax {
            pos: extra.pos,
            message: format!("unexpected {:?}", extra.token),
        });
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.peek().map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let next = self.tokens.get(self.pos).cloned();
        if next.is_some() {
            self.pos += 1;
        }
        next
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek_token() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn current_pos(&self) -> usize {
        self.peek().map(|s| s.pos).unwrap_or(self.end)
    }

    fn expect(&mut self, token: Token, what: &str) -> RuleResult<()> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}", what)))
        }
    }

    fn error(&self, message: impl Into<String>) -> RuleError {
        RuleError::Syntax {
            pos: self.current_pos(),
            message: message.into(),
        }
    }

    /// Run `step` one nesting level down
    fn nested<T>(&mut self, step: impl FnOnce(&mut Self) -> RuleResult<T>) -> RuleResult<T> {
        if self.depth >= MAX_DEPTH {
            return Err(RuleError::TooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        let result = step(self);
        self.depth -= 1;
        result
    }

    fn ternary(&mut self) -> RuleResult<Expr> {
        self.nested(Self::ternary_level)
    }

    fn ternary_level(&mut self) -> RuleResult<Expr> {
        let guard = self.or()?;
        if !self.eat(&Token::Question) {
            return Ok(guard);
        }
        let then = self.ternary()?;
        self.expect(Token::Colon, "':' in ternary")?;
        let otherwise = self.ternary()?;
        Ok(Expr::Ternary {
            guard: Box::new(guard),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn or(&mut self) -> RuleResult<Expr> {
        let mut left = self.and()?;
        while self.eat(&Token::Or) {
            let right = self.and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn and(&mut self) -> RuleResult<Expr> {
        let mut left = self.comparison()?;
        while self.eat(&Token::And) {
            let right = self.comparison()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn comparison(&mut self) -> RuleResult<Expr> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::NotEq,
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.additive()?;
            left = binary(op, left, right);
        }
    }

    fn additive(&mut self) -> RuleResult<Expr> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.term()?;
            left = binary(op, left, right);
        }
    }

    fn term(&mut self) -> RuleResult<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.unary()?;
            left = binary(op, left, right);
        }
    }

    fn unary(&mut self) -> RuleResult<Expr> {
        let op = match self.peek_token() {
            Some(Token::Bang) => UnaryOp::Not,
            Some(Token::Minus) => UnaryOp::Neg,
            _ => return self.primary(),
        };
        self.pos += 1;
        let operand = self.nested(Self::unary)?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn primary(&mut self) -> RuleResult<Expr> {
        let Some(Spanned { token, pos }) = self.advance() else {
            return Err(self.error("unexpected end of expression"));
        };

        match token {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::Ident(name) => self.identifier(name),
            Token::LParen => {
                let first = self.ternary()?;
                if self.eat(&Token::Comma) {
                    let second = self.ternary()?;
                    self.expect(Token::RParen, "')' closing quorum")?;
                    return Ok(quorum(first, second));
                }
                self.expect(Token::RParen, "')'")?;
                Ok(first)
            }
            other => Err(RuleError::Syntax {
                pos,
                message: format!("unexpected {:?}", other),
            }),
        }
    }

    fn identifier(&mut self, name: String) -> RuleResult<Expr> {
        match name.as_str() {
            "true" => return Ok(Expr::Bool(true)),
            "false" => return Ok(Expr::Bool(false)),
            _ => {}
        }

        if self.peek_token() == Some(&Token::LParen) {
            if name != QUORUM_FUNCTION {
                return Err(RuleError::UnknownFunction(name));
            }
            self.pos += 1;
            let min = self.ternary()?;
            self.expect(Token::Comma, "',' between NofM arguments")?;
            let signers = self.ternary()?;
            self.expect(Token::RParen, "')' closing NofM")?;
            return Ok(quorum(min, signers));
        }

        Variable::from_str(&name)
            .map(Expr::Variable)
            .map_err(|_| RuleError::UnknownVariable(name))
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn quorum(min: Expr, signers: Expr) -> Expr {
    Expr::Quorum {
        min: Box::new(min),
        signers: Box::new(signers),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_ternary_structure() {
        let expr = parse(r#"Amount < 13000 ? "no-action" : "deny""#).unwrap();
        assert_eq!(
            expr,
            Expr::Ternary {
                guard: Box::new(binary(
                    BinaryOp::Lt,
                    Expr::Variable(Variable::Amount),
                    Expr::Number(dec!(13000))
                )),
                then: Box::new(Expr::Str("no-action".into())),
                otherwise: Box::new(Expr::Str("deny".into())),
            }
        );
    }

    #[test]
    fn test_precedence() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let expr = parse("1 + 2 * 3").unwrap();
        let Expr::Binary { op, right, .. } = expr else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));

        // a || b && c parses as a || (b && c)
        let expr = parse("true || false && false").unwrap();
        assert!(matches!(expr, Expr::Binary { op: BinaryOp::Or, .. }));
    }

    #[test]
    fn test_tuple_and_nofm_are_the_same_node() {
        let tuple = parse(r#"(2, "A,B")"#).unwrap();
        let call = parse(r#"NofM(2, "A,B")"#).unwrap();
        assert_eq!(tuple, call);
        assert!(matches!(tuple, Expr::Quorum { .. }));
    }

    #[test]
    fn test_grouping_parentheses() {
        let expr = parse("(Amount + 1) * 2").unwrap();
        assert!(matches!(expr, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_unknown_function() {
        assert_eq!(
            parse("Max(1, 2)"),
            Err(RuleError::UnknownFunction("Max".to_string()))
        );
    }

    #[test]
    fn test_unknown_variable() {
        assert_eq!(
            parse("amount > 1"),
            Err(RuleError::UnknownVariable("amount".to_string()))
        );
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(matches!(parse("1 2"), Err(RuleError::Syntax { pos: 2, .. })));
    }

    #[test]
    fn test_missing_colon() {
        assert!(matches!(
            parse(r#"Amount > 1 ? "deny""#),
            Err(RuleError::Syntax { .. })
        ));
    }

    #[test]
    fn test_unexpected_end() {
        assert!(matches!(parse("Amount >"), Err(RuleError::Syntax { pos: 8, .. })));
    }

    #[test]
    fn test_deep_parentheses_rejected() {
        let depth = 10_000;
        let input = format!("{}Amount{}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(parse(&input), Err(RuleError::TooLong { len: 20_006, max: MAX_EXPRESSION_LENGTH }));

        let depth = 2_000;
        let input = format!("{}Amount{}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(parse(&input), Err(RuleError::TooDeep(MAX_DEPTH)));
    }

    #[test]
    fn test_deep_unary_chain_rejected() {
        let input = format!("{}true", "!".repeat(1_000));
        assert_eq!(parse(&input), Err(RuleError::TooDeep(MAX_DEPTH)));
    }

    #[test]
    fn test_moderate_nesting_accepted() {
        let input = format!("{}Amount{} > 1", "(".repeat(20), ")".repeat(20));
        assert!(parse(&input).is_ok());
    }

    #[test]
    fn test_nested_ternary_is_right_associative() {
        let expr = parse(r#"Amount > 5 ? "deny" : Amount > 1 ? (1, "A") : "no-action""#).unwrap();
        let Expr::Ternary { otherwise, .. } = expr else {
            panic!("expected ternary");
        };
        assert!(matches!(*otherwise, Expr::Ternary { .. }));
    }
}
