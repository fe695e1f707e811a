//! Constraint predicates over versions.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::version::Version;

/// Comparison operators for version constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

#[derive(Error, Debug)]
pub enum ConstraintError {
    #[error("invalid operator: {0}")]
    InvalidOperator(String),
    #[error("empty constraint")]
    Empty,
}

impl Operator {
    /// Parse an operator from its textual form.
    pub fn from_str(s: &str) -> Result<Self, ConstraintError> {
        match s {
            "=" | "==" => Ok(Operator::Equal),
            "!=" | "<>" => Ok(Operator::NotEqual),
            "<" => Ok(Operator::LessThan),
            "<=" => Ok(Operator::LessThanOrEqual),
            ">" => Ok(Operator::GreaterThan),
            ">=" => Ok(Operator::GreaterThanOrEqual),
            _ => Err(ConstraintError::InvalidOperator(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::LessThan => "<",
            Operator::LessThanOrEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqual => ">=",
        }
    }

    fn compare(&self, candidate: &Version, bound: &Version) -> bool {
        match self {
            Operator::Equal => candidate == bound,
            Operator::NotEqual => candidate != bound,
            Operator::LessThan => candidate < bound,
            Operator::LessThanOrEqual => candidate <= bound,
            Operator::GreaterThan => candidate > bound,
            Operator::GreaterThanOrEqual => candidate >= bound,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A predicate over package versions.
///
/// A constraint either matches everything, compares against a single bound,
/// or is the conjunction of several child constraints. The `Display` output
/// is canonical and serves as the pool's memoization key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Constraint {
    /// Matches any version (`*`).
    Any,
    /// A single comparison, e.g. `>= 1.2`.
    Cmp(Operator, Version),
    /// Conjunction of child constraints; matches when all children match.
    And(Vec<Constraint>),
}

impl Constraint {
    /// An exact-version constraint.
    pub fn exact(version: Version) -> Self {
        Constraint::Cmp(Operator::Equal, version)
    }

    /// Build a conjunction, collapsing trivial cases.
    pub fn and(constraints: Vec<Constraint>) -> Self {
        let mut children: Vec<Constraint> = constraints
            .into_iter()
            .filter(|c| !matches!(c, Constraint::Any))
            .collect();
        match children.len() {
            0 => Constraint::Any,
            1 => children.remove(0),
            _ => Constraint::And(children),
        }
    }

    /// Parse a constraint string.
    ///
    /// Accepts `*`, an optional operator followed by a version (`>=1.0`,
    /// `!= 2.0`, bare `1.2.3` for exact match), and comma or
    /// whitespace-separated conjunctions (`>=1.0, <2.0`).
    pub fn parse(input: &str) -> Result<Self, ConstraintError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ConstraintError::Empty);
        }
        if input == "*" {
            return Ok(Constraint::Any);
        }

        let mut children = Vec::new();
        for token in input.split([',', ' ']).filter(|t| !t.is_empty()) {
            children.push(Self::parse_single(token)?);
        }
        Ok(Constraint::and(children))
    }

    fn parse_single(token: &str) -> Result<Self, ConstraintError> {
        if token == "*" {
            return Ok(Constraint::Any);
        }
        let split = token
            .char_indices()
            .find(|(_, c)| !matches!(c, '<' | '>' | '=' | '!'))
            .map(|(i, _)| i)
            .unwrap_or(token.len());
        let (op, version) = token.split_at(split);
        if version.is_empty() {
            return Err(ConstraintError::Empty);
        }
        if !version.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(ConstraintError::InvalidOperator(token.to_string()));
        }
        let operator = if op.is_empty() {
            Operator::Equal
        } else {
            Operator::from_str(op)?
        };
        Ok(Constraint::Cmp(operator, Version::parse(version)))
    }

    /// Does `version` satisfy this constraint?
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            Constraint::Any => true,
            Constraint::Cmp(op, bound) => op.compare(version, bound),
            Constraint::And(children) => children.iter().all(|c| c.matches(version)),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Any => write!(f, "*"),
            Constraint::Cmp(op, version) => write!(f, "{} {}", op, version),
            Constraint::And(children) => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", child)?;
                }
                Ok(())
            }
        }
    }
}
