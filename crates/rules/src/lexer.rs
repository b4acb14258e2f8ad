//! Tokenizer for rule expressions

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::{RuleError, RuleResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(Decimal),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    Comma,
    Question,
    Colon,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    And,
    Or,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A token and the char offset where it starts
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: usize,
}

pub fn tokenize(input: &str) -> RuleResult<Vec<Spanned>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let token = match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            ',' => Token::Comma,
            '?' => Token::Question,
            ':' => Token::Colon,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '!' if chars.get(i + 1) == Some(&'=') => {
                i += 1;
                Token::NotEq
            }
            '!' => Token::Bang,
            '=' if chars.get(i + 1) == Some(&'=') => {
                i += 1;
                Token::Eq
            }
            '<' if chars.get(i + 1) == Some(&'=') => {
                i += 1;
                Token::Le
            }
            '<' => Token::Lt,
            '>' if chars.get(i + 1) == Some(&'=') => {
                i += 1;
                Token::Ge
            }
            '>' => Token::Gt,
            '&' if chars.get(i + 1) == Some(&'&') => {
                i += 1;
                Token::And
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                i += 1;
                Token::Or
            }
            '\'' | '"' => {
                let (literal, next) = read_string(&chars, i)?;
                tokens.push(Spanned {
                    token: Token::Str(literal),
                    pos: start,
                });
                i = next;
                continue;
            }
            c if c.is_ascii_digit() => {
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let value = Decimal::from_str(&literal)
                    .map_err(|_| RuleError::InvalidNumber(literal.clone()))?;
                tokens.push(Spanned {
                    token: Token::Number(value),
                    pos: start,
                });
                continue;
            }
            c if c.is_alphabetic() || c == '_' => {
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Spanned {
                    token: Token::Ident(chars[start..i].iter().collect()),
                    pos: start,
                });
                continue;
            }
            other => {
                return Err(RuleError::UnexpectedChar {
                    ch: other,
                    pos: start,
                })
            }
        };

        tokens.push(Spanned { token, pos: start });
        i += 1;
    }

    Ok(tokens)
}

/// Read a quoted literal starting at `start`; returns the text and the index after the closing quote
fn read_string(chars: &[char], start: usize) -> RuleResult<(String, usize)> {
    let quote = chars[start];
    let mut literal = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                literal.push(chars[i + 1]);
                i += 2;
            }
            c if c == quote => return Ok((literal, i + 1)),
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }

    Err(RuleError::UnterminatedString(start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn test_tokenize_ternary_rule() {
        let tokens = kinds(r#"Amount < 13000 ? "no-action" : 'deny'"#);
        assert_eq!(
            tokens,
            vec![
                Token::Ident("Amount".into()),
                Token::Lt,
                Token::Number(dec!(13000)),
                Token::Question,
                Token::Str("no-action".into()),
                Token::Colon,
                Token::Str("deny".into()),
            ]
        );
    }

    #[test]
    fn test_tokenize_two_char_operators() {
        let tokens = kinds("a <= b >= c == d != e && f || !g");
        assert!(tokens.contains(&Token::Le));
        assert!(tokens.contains(&Token::Ge));
        assert!(tokens.contains(&Token::Eq));
        assert!(tokens.contains(&Token::NotEq));
        assert!(tokens.contains(&Token::And));
        assert!(tokens.contains(&Token::Or));
        assert!(tokens.contains(&Token::Bang));
    }

    #[test]
    fn test_tokenize_decimal_and_positions() {
        let tokens = tokenize("  12.50").unwrap();
        assert_eq!(tokens[0].token, Token::Number(dec!(12.50)));
        assert_eq!(tokens[0].pos, 2);
    }

    #[test]
    fn test_escaped_quote() {
        assert_eq!(kinds(r"'it\'s'"), vec![Token::Str("it's".into())]);
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(
            tokenize("Amount > 1 ? 'deny"),
            Err(RuleError::UnterminatedString(13))
        );
    }

    #[test]
    fn test_single_equals_rejected() {
        assert!(matches!(
            tokenize("Amount = 1"),
            Err(RuleError::UnexpectedChar { ch: '=', pos: 7 })
        ));
    }

    #[test]
    fn test_bad_number() {
        assert!(matches!(
            tokenize("1.2.3"),
            Err(RuleError::InvalidNumber(_))
        ));
    }
}
