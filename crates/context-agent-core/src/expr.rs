//! Arithmetic expression extraction and evaluation.
//!
//! A small recursive-descent evaluator over `+ - * / ( )` and decimal
//! numbers. The grammar, with the usual precedence and left associativity:
//!
//! ```text
//! expression := term (('+' | '-') term)*
//! term       := factor (('*' | '/') factor)*
//! factor     := '(' expression ')' | number
//! number     := [0-9.]+
//! ```
//!
//! There is no unary minus. Division by zero, malformed input, and
//! non-finite results are errors rather than `inf`/`NaN` values.
//!
//! # Example
//!
//! ```rust
//! use context_agent_core::expr::{evaluate, EvalError};
//!
//! assert_eq!(evaluate("(2 + 3) * 4"), Ok(20.0));
//! assert_eq!(evaluate("10/0"), Err(EvalError::DivisionByZero));
//! ```

use thiserror::Error;

/// Why an expression could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("empty expression")]
    Empty,
    #[error("invalid character '{0}' in expression")]
    InvalidCharacter(char),
    #[error("expected a number at position {0}")]
    ExpectedNumber(usize),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("missing closing parenthesis at position {0}")]
    UnclosedParen(usize),
    #[error("unexpected '{found}' at position {pos}")]
    Unexpected { found: char, pos: usize },
    #[error("division by zero")]
    DivisionByZero,
    #[error("result is not a finite number")]
    NonFinite,
}

/// Find the longest run of expression characters (digits, operators,
/// parentheses, decimal points, and whitespace) that contains at least one
/// digit. Ties go to the earliest run. The returned text is trimmed.
pub fn extract_expression(message: &str) -> Option<&str> {
    let mut runs = Vec::new();
    let mut run_start: Option<usize> = None;

    for (i, c) in message.char_indices() {
        if is_expression_char(c) || c.is_whitespace() {
            run_start.get_or_insert(i);
        } else if let Some(start) = run_start.take() {
            runs.push(&message[start..i]);
        }
    }
    if let Some(start) = run_start {
        runs.push(&message[start..]);
    }

    let mut best: Option<&str> = None;
    for run in runs
        .into_iter()
        .map(str::trim)
        .filter(|run| run.chars().any(|c| c.is_ascii_digit()))
    {
        if best.map_or(true, |b| run.len() > b.len()) {
            best = Some(run);
        }
    }
    best
}

/// Evaluate an arithmetic expression. Whitespace is ignored.
pub fn evaluate(expression: &str) -> Result<f64, EvalError> {
    let compact: Vec<u8> = expression
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| {
            if is_expression_char(c) {
                Ok(c as u8)
            } else {
                Err(EvalError::InvalidCharacter(c))
            }
        })
        .collect::<Result<_, _>>()?;

    if compact.is_empty() {
        return Err(EvalError::Empty);
    }

    let mut parser = Parser {
        input: &compact,
        pos: 0,
    };
    let value = parser.expression()?;
    if let Some(&found) = parser.input.get(parser.pos) {
        return Err(EvalError::Unexpected {
            found: found as char,
            pos: parser.pos,
        });
    }
    if !value.is_finite() {
        return Err(EvalError::NonFinite);
    }
    Ok(value)
}

fn is_expression_char(c: char) -> bool {
    matches!(c, '0'..='9' | '+' | '-' | '*' | '/' | '.' | '(' | ')')
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn expression(&mut self) -> Result<f64, EvalError> {
        let mut value = self.term()?;
        while let Some(op @ (b'+' | b'-')) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            if op == b'+' {
                value += rhs;
            } else {
                value -= rhs;
            }
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, EvalError> {
        let mut value = self.factor()?;
        while let Some(op @ (b'*' | b'/')) = self.peek() {
            self.pos += 1;
            let rhs = self.factor()?;
            if op == b'*' {
                value *= rhs;
            } else {
                if rhs == 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                value /= rhs;
            }
        }
        Ok(value)
    }

    fn factor(&mut self) -> Result<f64, EvalError> {
        if self.peek() == Some(b'(') {
            self.pos += 1;
            let value = self.expression()?;
            if self.peek() != Some(b')') {
                return Err(EvalError::UnclosedParen(self.pos));
            }
            self.pos += 1;
            return Ok(value);
        }
        self.number()
    }

    fn number(&mut self) -> Result<f64, EvalError> {
        let start = self.pos;
        while let Some(b'0'..=b'9' | b'.') = self.peek() {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(EvalError::ExpectedNumber(start));
        }
        // The slice only holds ASCII digits and dots.
        let literal = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
        literal
            .parse::<f64>()
            .map_err(|_| EvalError::InvalidNumber(literal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addition() {
        assert_eq!(evaluate("2+2"), Ok(4.0));
    }

    #[test]
    fn test_precedence() {
        assert_eq!(evaluate("2+3*4"), Ok(14.0));
        assert_eq!(evaluate("20-6/2"), Ok(17.0));
    }

    #[test]
    fn test_parentheses() {
        assert_eq!(evaluate("(2+3)*4"), Ok(20.0));
        assert_eq!(evaluate("((1+1)*(2+2))/4"), Ok(2.0));
    }

    #[test]
    fn test_left_associativity() {
        assert_eq!(evaluate("10-4-3"), Ok(3.0));
        assert_eq!(evaluate("64/4/2"), Ok(8.0));
    }

    #[test]
    fn test_decimals_and_whitespace() {
        assert_eq!(evaluate(" 1.5 * 4 "), Ok(6.0));
        assert_eq!(evaluate(".5+.5"), Ok(1.0));
    }

    #[test]
    fn test_division_by_zero_is_error() {
        assert_eq!(evaluate("10/0"), Err(EvalError::DivisionByZero));
        assert_eq!(evaluate("1/(2-2)"), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn test_malformed_expressions() {
        assert_eq!(evaluate(""), Err(EvalError::Empty));
        assert_eq!(evaluate("   "), Err(EvalError::Empty));
        assert_eq!(evaluate("2+"), Err(EvalError::ExpectedNumber(2)));
        assert_eq!(evaluate("-3"), Err(EvalError::ExpectedNumber(0)));
        assert_eq!(evaluate("(2+3"), Err(EvalError::UnclosedParen(4)));
        assert_eq!(
            evaluate("2+3)"),
            Err(EvalError::Unexpected { found: ')', pos: 3 })
        );
        assert_eq!(
            evaluate("1.2.3"),
            Err(EvalError::InvalidNumber("1.2.3".to_string()))
        );
        assert_eq!(evaluate("2^3"), Err(EvalError::InvalidCharacter('^')));
    }

    #[test]
    fn test_overflow_is_error() {
        let huge = format!("{}*{}", "9".repeat(200), "9".repeat(200));
        assert_eq!(evaluate(&huge), Err(EvalError::NonFinite));
    }

    #[test]
    fn test_extract_expression_picks_longest_run() {
        assert_eq!(extract_expression("what is 5*6?"), Some("5*6"));
        assert_eq!(
            extract_expression("In 2024 I had (12 + 8) * 3 apples"),
            Some("(12 + 8) * 3")
        );
        assert_eq!(
            extract_expression("What's the weather in Paris and what is 5*6?"),
            Some("5*6")
        );
    }

    #[test]
    fn test_extract_expression_requires_digit() {
        assert_eq!(extract_expression("please calculate - ( )"), None);
        assert_eq!(extract_expression("no numbers here"), None);
    }
}
