//! Binding expression parser
//!
//! Grammar (one or more units joined by the word `and`):
//! ```text
//! [<left>[.<modifier>...]] <operator> <right>[.<modifier>...] [and ...]
//! ```
//!
//! Examples:
//! ```text
//! as greeting                  → right = greeting
//! foo into test                → left = foo, operator = into
//! save on click.prevent.stop   → right = click, right_attrs = [prevent, stop]
//! value as foo and title as bar
//! ```

mod ident;

use std::fmt;
use std::str::FromStr;

use crate::error::BindError;

pub use ident::{is_identifier, split_operand, MAX_IDENT_LEN};

/// Literal word separating expression units
pub const SEPARATOR: &str = "and";

/// The three primitive binding operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Expose a live get/set pair under an alias
    As,
    /// Aggregate many writers under one write-only alias
    Into,
    /// Attach an event listener
    On,
}

impl Operator {
    pub const ALL: [Operator; 3] = [Operator::As, Operator::Into, Operator::On];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::As => "as",
            Operator::Into => "into",
            Operator::On => "on",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = BindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| BindError::UnknownOperator {
                operator: s.to_string(),
            })
    }
}

/// One parsed expression unit
///
/// `left`/`left_attrs` are `None` only for the 2-token form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    pub left: Option<String>,
    pub left_attrs: Option<Vec<String>>,
    pub operator: Operator,
    pub right: String,
    pub right_attrs: Vec<String>,
}

impl Expression {
    /// Check if the right operand carries a modifier
    pub fn has_right_attr(&self, name: &str) -> bool {
        self.right_attrs.iter().any(|attr| attr == name)
    }
}

/// Parse an expression string into its ordered units
pub fn parse(input: &str) -> Result<Vec<Expression>, BindError> {
    if input.trim().is_empty() {
        return Err(BindError::EmptyExpression);
    }

    let mut segments: Vec<Vec<&str>> = vec![Vec::new()];
    for token in input.split_whitespace() {
        if token == SEPARATOR {
            segments.push(Vec::new());
        } else if let Some(current) = segments.last_mut() {
            current.push(token);
        }
    }

    segments.iter().map(|tokens| parse_unit(tokens)).collect()
}

/// Parse an optional expression (absent input is an error)
pub fn parse_opt(input: Option<&str>) -> Result<Vec<Expression>, BindError> {
    parse(input.ok_or(BindError::EmptyExpression)?)
}

fn parse_unit(tokens: &[&str]) -> Result<Expression, BindError> {
    let (left, operator, right) = match *tokens {
        [operator, right] => (None, operator, right),
        [left, operator, right] => (Some(left), operator, right),
        _ => {
            return Err(BindError::InvalidExpression {
                expression: tokens.join(" "),
                tokens: tokens.len(),
            })
        }
    };

    let left = left.map(|token| split_operand(token, "left")).transpose()?;
    let operator: Operator = operator.parse()?;
    let (right, right_attrs) = split_operand(right, "right")?;

    let (left, left_attrs) = match left {
        Some((head, attrs)) => (Some(head), Some(attrs)),
        None => (None, None),
    };

    Ok(Expression {
        left,
        left_attrs,
        operator,
        right,
        right_attrs,
    })
}
