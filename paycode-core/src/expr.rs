//! Arithmetic in amount fields, so `10+5` or `(2*3` can be typed directly.
//!
//! Input is evaluated on every keystroke, so half-typed expressions are the
//! normal case: dangling operators are dropped and open parentheses closed
//! before parsing.

use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::debug;

use crate::error::ExprError;

const DANGLING: [char; 8] = ['+', '-', '*', 'x', '×', '/', '÷', '('];

/// Nesting of parentheses and unary signs allowed before evaluation gives up.
const MAX_DEPTH: usize = 64;

/// Strip trailing operators and open parentheses, default to `"0"`, and
/// close any parenthesis left open.
pub fn sanitize_expression(input: &str) -> String {
    let mut expression = input.trim().to_string();
    while let Some(last) = expression.chars().last() {
        if DANGLING.contains(&last) || last.is_whitespace() {
            expression.pop();
        } else {
            break;
        }
    }
    if expression.is_empty() {
        return "0".to_string();
    }

    let mut depth: usize = 0;
    for ch in expression.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    expression.extend(std::iter::repeat(')').take(depth));
    expression
}

/// Sanitize and evaluate `input` exactly.
pub fn evaluate(input: &str) -> Result<Decimal, ExprError> {
    let sanitized = sanitize_expression(input);
    let tokens = tokenize(&sanitized)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expression()?;
    if let Some(token) = parser.peek() {
        return Err(ExprError::UnexpectedToken {
            found: token.describe(),
        });
    }
    Ok(value)
}

/// Evaluate `input`, falling back to `previous` when it does not parse.
///
/// Failures are logged at debug level only; they occur on nearly every
/// keystroke of a partially typed expression.
pub fn evaluate_or(input: &str, previous: &str) -> String {
    match evaluate(input) {
        Ok(value) => value.normalize().to_string(),
        Err(err) => {
            debug!(input, error = %err, "amount expression did not evaluate, keeping previous value");
            previous.to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Decimal),
    Plus,
    Minus,
    Star,
    Slash,
    Open,
    Close,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(value) => format!("number {value}"),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::Open => "'('".to_string(),
            Token::Close => "')'".to_string(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut idx = 0;
    while idx < chars.len() {
        let ch = chars[idx];
        let token = match ch {
            c if c.is_whitespace() => {
                idx += 1;
                continue;
            }
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' | 'x' | '×' => Token::Star,
            '/' | '÷' => Token::Slash,
            '(' => Token::Open,
            ')' => Token::Close,
            c if c.is_ascii_digit() || c == '.' => {
                let start = idx;
                while idx < chars.len() && (chars[idx].is_ascii_digit() || chars[idx] == '.') {
                    idx += 1;
                }
                let literal: String = chars[start..idx].iter().collect();
                let value = Decimal::from_str(&literal).map_err(|_| ExprError::UnexpectedToken {
                    found: format!("number '{literal}'"),
                })?;
                tokens.push(Token::Number(value));
                continue;
            }
            other => {
                return Err(ExprError::UnexpectedCharacter {
                    character: other,
                    position: idx,
                })
            }
        };
        tokens.push(token);
        idx += 1;
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    // expression := term (('+' | '-') term)*
    fn expression(&mut self) -> Result<Decimal, ExprError> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    let rhs = self.term()?;
                    value = value.checked_add(rhs).ok_or(ExprError::Overflow)?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    let rhs = self.term()?;
                    value = value.checked_sub(rhs).ok_or(ExprError::Overflow)?;
                }
                _ => return Ok(value),
            }
        }
    }

    // term := factor (('*' | '/') factor)*
    fn term(&mut self) -> Result<Decimal, ExprError> {
        let mut value = self.factor()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    let rhs = self.factor()?;
                    value = value.checked_mul(rhs).ok_or(ExprError::Overflow)?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let rhs = self.factor()?;
                    if rhs.is_zero() {
                        return Err(ExprError::DivisionByZero);
                    }
                    value = value.checked_div(rhs).ok_or(ExprError::Overflow)?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn nested<T>(
        &mut self,
        inner: impl FnOnce(&mut Self) -> Result<T, ExprError>,
    ) -> Result<T, ExprError> {
        if self.depth >= MAX_DEPTH {
            return Err(ExprError::TooDeep { limit: MAX_DEPTH });
        }
        self.depth += 1;
        let result = inner(self);
        self.depth -= 1;
        result
    }

    // factor := ('+' | '-') factor | number | '(' expression ')'
    fn factor(&mut self) -> Result<Decimal, ExprError> {
        match self.next() {
            Some(Token::Number(value)) => Ok(value),
            Some(Token::Minus) => Ok(-self.nested(Self::factor)?),
            Some(Token::Plus) => self.nested(Self::factor),
            Some(Token::Open) => {
                let value = self.nested(Self::expression)?;
                match self.next() {
                    Some(Token::Close) => Ok(value),
                    Some(other) => Err(ExprError::UnexpectedToken {
                        found: other.describe(),
                    }),
                    None => Err(ExprError::UnexpectedToken {
                        found: "end of input".to_string(),
                    }),
                }
            }
            Some(other) => Err(ExprError::UnexpectedToken {
                found: other.describe(),
            }),
            None => Err(ExprError::UnexpectedToken {
                found: "end of input".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_dangling_operators() {
        assert_eq!(sanitize_expression("12+"), "12");
        assert_eq!(sanitize_expression("12 * "), "12");
        assert_eq!(sanitize_expression("3-("), "3");
        assert_eq!(sanitize_expression("+-*/("), "0");
        assert_eq!(sanitize_expression("12x"), "12");
        assert_eq!(sanitize_expression("12 ÷ "), "12");
    }

    #[test]
    fn alias_operators_dangle_like_ascii_ones() {
        assert_eq!(evaluate_or("12x", "5"), "12");
        assert_eq!(evaluate_or("12×", "5"), "12");
        assert_eq!(evaluate_or("12÷", "5"), "12");
        assert_eq!(evaluate_or("3x4", "0"), "12");
        assert_eq!(evaluate_or("12÷4", "0"), "3");
    }

    #[test]
    fn deep_nesting_is_refused() {
        let parens = format!("{}1", "(".repeat(200_000));
        assert_eq!(evaluate_or(&parens, "7"), "7");
        assert_eq!(
            evaluate(&format!("{}1", "-".repeat(10_000))),
            Err(ExprError::TooDeep { limit: MAX_DEPTH })
        );
        assert_eq!(evaluate_or("((((1+1))))*--2", "0"), "4");
    }

    #[test]
    fn empty_input_defaults_to_zero() {
        assert_eq!(sanitize_expression(""), "0");
        assert_eq!(evaluate_or("", "5"), "0");
    }

    #[test]
    fn closes_open_parentheses() {
        assert_eq!(sanitize_expression("(2*3"), "(2*3)");
        assert_eq!(sanitize_expression("((1+2)*(3"), "((1+2)*(3))");
        assert_eq!(sanitize_expression("(2*("), "(2)");
    }

    #[test]
    fn evaluates_partially_typed_expressions() {
        assert_eq!(evaluate_or("12+", "0"), "12");
        assert_eq!(evaluate_or("10+5", "0"), "15");
        assert_eq!(evaluate_or("(2*3", "0"), "6");
        assert_eq!(evaluate_or("2+3*4", "0"), "14");
        assert_eq!(evaluate_or("(2+3)*4", "0"), "20");
        assert_eq!(evaluate_or("-5+10", "0"), "5");
    }

    #[test]
    fn decimal_arithmetic_is_exact() {
        assert_eq!(evaluate_or("0.1+0.2", "0"), "0.3");
        assert_eq!(evaluate_or("1/4", "0"), "0.25");
        assert_eq!(evaluate_or("0.0001*3", "0"), "0.0003");
    }

    #[test]
    fn failures_keep_previous_value() {
        assert_eq!(evaluate_or("12abc", "12"), "12");
        assert_eq!(evaluate_or("4/0", "4"), "4");
        assert_eq!(evaluate_or("1..2", "1"), "1");
        assert_eq!(evaluate_or("2)(", "2"), "2");
    }

    #[test]
    fn reports_typed_errors() {
        assert_eq!(evaluate("4/0"), Err(ExprError::DivisionByZero));
        assert!(matches!(
            evaluate("3$"),
            Err(ExprError::UnexpectedCharacter { character: '$', position: 1 })
        ));
        assert!(matches!(evaluate("2 3"), Err(ExprError::UnexpectedToken { .. })));
    }
}
