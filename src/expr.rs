//! Parser for legacy string conditions.
//!
//! Grammar (JavaScript-flavoured, deliberately tiny):
//!
//! ```text
//! or         := and ( "||" and )*
//! and        := unary ( "&&" unary )*
//! unary      := "!" unary | primary
//! primary    := "(" or ")" | comparison
//! comparison := operand ( ("==" | "===" | "!=" | "!==") operand )?
//! operand    := identifier | 'string' | "string" | number | true | false | null
//! ```
//!
//! One side of a comparison must be an identifier (a field key) and the
//! other a literal. A lone identifier tests truthiness.

use serde_json::Value;

use crate::condition::{Expr, truthy};
use crate::error::ConfformError;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Literal(Value),
    Eq { strict: bool },
    Ne { strict: bool },
    And,
    Or,
    Not,
    LParen,
    RParen,
}

/// Parse a condition expression into an [`Expr`].
pub fn parse_expression(text: &str) -> Result<Expr, ConfformError> {
    let fail = |reason: String| ConfformError::InvalidCondition {
        expression: text.to_string(),
        reason,
    };
    let tokens = tokenize(text).map_err(fail)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or().map_err(fail)?;
    if let Some(tok) = parser.peek() {
        return Err(fail(format!("unexpected {tok:?}")));
    }
    Ok(expr)
}

fn tokenize(text: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '&' | '|' => {
                if chars.get(i + 1) != Some(&c) {
                    return Err(format!("expected '{c}{c}' at offset {i}"));
                }
                tokens.push(if c == '&' { Token::And } else { Token::Or });
                i += 2;
            }
            '=' | '!' => {
                let eq_run = chars[i + 1..].iter().take_while(|&&ch| ch == '=').count();
                match (c, eq_run) {
                    ('!', 0) => tokens.push(Token::Not),
                    ('!', 1) => tokens.push(Token::Ne { strict: false }),
                    ('!', 2) => tokens.push(Token::Ne { strict: true }),
                    ('=', 1) => tokens.push(Token::Eq { strict: false }),
                    ('=', 2) => tokens.push(Token::Eq { strict: true }),
                    _ => return Err(format!("unsupported operator at offset {i}")),
                }
                i += 1 + eq_run;
            }
            '\'' | '"' => {
                let (s, next) = read_string(&chars, i)?;
                tokens.push(Token::Literal(Value::String(s)));
                i = next;
            }
            c if c.is_ascii_digit() || c == '-' || c == '.' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let number: f64 = text
                    .parse()
                    .map_err(|_| format!("invalid number '{text}'"))?;
                let value = serde_json::Number::from_f64(number)
                    .map(Value::Number)
                    .ok_or_else(|| format!("invalid number '{text}'"))?;
                tokens.push(Token::Literal(value));
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "true" => Token::Literal(Value::Bool(true)),
                    "false" => Token::Literal(Value::Bool(false)),
                    "null" | "undefined" => Token::Literal(Value::Null),
                    _ => Token::Ident(word),
                });
            }
            other => return Err(format!("unexpected character '{other}' at offset {i}")),
        }
    }
    Ok(tokens)
}

fn read_string(chars: &[char], start: usize) -> Result<(String, usize), String> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .ok_or_else(|| "dangling escape".to_string())?;
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => *other,
                });
                i += 2;
            }
            c if c == quote => return Ok((out, i + 1)),
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Err(format!("unterminated string starting at offset {start}"))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn or(&mut self) -> Result<Expr, String> {
        let mut items = vec![self.and()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            items.push(self.and()?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Expr::Or(items)
        })
    }

    fn and(&mut self) -> Result<Expr, String> {
        let mut items = vec![self.unary()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            items.push(self.unary()?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Expr::And(items)
        })
    }

    fn unary(&mut self) -> Result<Expr, String> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, String> {
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let inner = self.or()?;
            return match self.next() {
                Some(Token::RParen) => Ok(inner),
                other => Err(format!("expected ')', found {other:?}")),
            };
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, String> {
        let left = self.operand()?;
        let (strict, negate) = match self.peek() {
            Some(Token::Eq { strict }) => (*strict, false),
            Some(Token::Ne { strict }) => (*strict, true),
            _ => {
                return Ok(match left {
                    Token::Ident(key) => Expr::Truthy { key },
                    Token::Literal(v) => Expr::Const(truthy(&v)),
                    _ => unreachable!("operand() only yields identifiers and literals"),
                });
            }
        };
        self.pos += 1;
        let right = self.operand()?;

        let (key, expected) = match (left, right) {
            (Token::Ident(key), Token::Literal(v)) | (Token::Literal(v), Token::Ident(key)) => {
                (key, v)
            }
            (Token::Ident(a), Token::Ident(b)) => {
                return Err(format!("cannot compare two fields ('{a}' and '{b}')"));
            }
            _ => return Err("comparison needs a field key on one side".into()),
        };
        Ok(Expr::Compare {
            key,
            expected,
            strict,
            negate,
        })
    }

    fn operand(&mut self) -> Result<Token, String> {
        match self.next() {
            Some(tok @ (Token::Ident(_) | Token::Literal(_))) => Ok(tok),
            Some(other) => Err(format!("expected a field key or literal, found {other:?}")),
            None => Err("unexpected end of expression".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cmp(key: &str, expected: Value, strict: bool, negate: bool) -> Expr {
        Expr::Compare {
            key: key.into(),
            expected,
            strict,
            negate,
        }
    }

    #[test]
    fn simple_equality() {
        assert_eq!(
            parse_expression("q1 == '45'").unwrap(),
            cmp("q1", json!("45"), false, false)
        );
        assert_eq!(
            parse_expression("q1 === \"45\"").unwrap(),
            cmp("q1", json!("45"), true, false)
        );
    }

    #[test]
    fn literal_on_the_left() {
        assert_eq!(
            parse_expression("'x' != mode").unwrap(),
            cmp("mode", json!("x"), false, true)
        );
    }

    #[test]
    fn precedence_and_binds_tighter_than_or() {
        let expr = parse_expression("a == 1 || b == 2 && c == 3").unwrap();
        match expr {
            Expr::Or(items) => {
                assert_eq!(items.len(), 2);
                assert!(matches!(items[1], Expr::And(_)));
            }
            other => panic!("Expected Or, got {other:?}"),
        }
    }

    #[test]
    fn parentheses_and_negation() {
        let expr = parse_expression("!(a == true)").unwrap();
        assert_eq!(expr, Expr::Not(Box::new(cmp("a", json!(true), false, false))));
    }

    #[test]
    fn bare_identifier_is_truthiness() {
        assert_eq!(
            parse_expression("enabled").unwrap(),
            Expr::Truthy {
                key: "enabled".into()
            }
        );
    }

    #[test]
    fn numbers_and_keywords() {
        assert_eq!(
            parse_expression("n == -2.5").unwrap(),
            cmp("n", json!(-2.5), false, false)
        );
        assert_eq!(
            parse_expression("x == undefined").unwrap(),
            cmp("x", Value::Null, false, false)
        );
    }

    #[test]
    fn escapes_in_strings() {
        assert_eq!(
            parse_expression(r#"s == 'it\'s'"#).unwrap(),
            cmp("s", json!("it's"), false, false)
        );
    }

    #[test]
    fn rejects_code_like_input() {
        for bad in [
            "alert(1)",
            "a = 1",
            "a == ",
            "a == b",
            "(a == 1",
            "a == 'open",
            "a + 1",
            "a & b",
        ] {
            assert!(parse_expression(bad).is_err(), "should reject: {bad}");
        }
    }

    #[test]
    fn error_carries_expression() {
        let err = parse_expression("a ==").unwrap_err();
        assert!(err.to_string().contains("'a =='"));
    }
}
