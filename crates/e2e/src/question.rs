//! Arithmetic question parsing
//!
//! The game renders questions such as `12 × 3` or `84 ÷ 7 = ?`. Only the
//! leading `<int> <op> <int>` tokens matter; everything after them is ignored.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{E2eError, E2eResult};

static QUESTION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+)\s*([+\-×÷])\s*(\d+)").expect("question pattern is valid")
});

/// One of the four operators the game asks about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operator {
    /// Symbol as rendered by the game
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Multiply => "×",
            Operator::Divide => "÷",
        }
    }

    pub fn from_symbol(symbol: &str) -> E2eResult<Self> {
        match symbol {
            "+" => Ok(Operator::Add),
            "-" => Ok(Operator::Subtract),
            "×" => Ok(Operator::Multiply),
            "÷" => Ok(Operator::Divide),
            other => Err(E2eError::UnknownOperator(other.to_string())),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A question reduced to its operands and operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedQuestion {
    pub left: i64,
    pub operator: Operator,
    pub right: i64,
}

impl ParsedQuestion {
    pub fn parse(text: &str) -> E2eResult<Self> {
        let parse_error = || E2eError::QuestionParse {
            text: text.to_string(),
        };

        let captures = QUESTION_PATTERN.captures(text).ok_or_else(parse_error)?;
        let left = captures[1].parse::<i64>().map_err(|_| parse_error())?;
        let operator = Operator::from_symbol(&captures[2])?;
        let right = captures[3].parse::<i64>().map_err(|_| parse_error())?;

        Ok(Self {
            left,
            operator,
            right,
        })
    }

    /// Integer answer. Division floors, and a zero divisor answers `0`.
    pub fn answer(&self) -> i128 {
        let left = i128::from(self.left);
        let right = i128::from(self.right);
        match self.operator {
            Operator::Add => left + right,
            Operator::Subtract => left - right,
            Operator::Multiply => left * right,
            Operator::Divide if right == 0 => 0,
            Operator::Divide => floor_div(left, right),
        }
    }
}

impl FromStr for ParsedQuestion {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ParsedQuestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.left, self.operator, self.right)
    }
}

/// Parse question text and return the expected answer
pub fn compute_answer(text: &str) -> E2eResult<i128> {
    Ok(ParsedQuestion::parse(text)?.answer())
}

fn floor_div(left: i128, right: i128) -> i128 {
    let quotient = left / right;
    if left % right != 0 && (left < 0) != (right < 0) {
        quotient - 1
    } else {
        quotient
    }
}
