//! Stage argument coercion
//!
//! Arguments arrive as raw text after the stage name. A token made only of
//! digits becomes an integer, digits with one fractional part become a
//! float, and everything else stays text. Coercion is purely lexical: a
//! leading sign is not part of the grammar, so `-5` stays text.

use nom::{
    bytes::complete::tag,
    character::complete::digit1,
    combinator::{all_consuming, opt},
    sequence::{pair, preceded},
    IResult,
};
use serde::Serialize;

/// A coerced stage argument
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StageArg {
    /// Integer literal
    Int(i64),
    /// Decimal literal
    Float(f64),
    /// Anything else, kept verbatim
    Str(String),
}

impl StageArg {
    /// Numeric value, if the argument is a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StageArg::Int(v) => Some(*v as f64),
            StageArg::Float(v) => Some(*v),
            StageArg::Str(_) => None,
        }
    }

    /// Integer value, if the argument is an integer literal
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            StageArg::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl std::fmt::Display for StageArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageArg::Int(v) => write!(f, "{}", v),
            StageArg::Float(v) => write!(f, "{}", v),
            StageArg::Str(s) => f.write_str(s),
        }
    }
}

/// `\d+(\.\d+)?`
fn number(input: &str) -> IResult<&str, (&str, Option<&str>)> {
    pair(digit1, opt(preceded(tag("."), digit1)))(input)
}

/// Coerce one raw argument token
pub fn coerce_argument(raw: &str) -> StageArg {
    let Ok((_, (_, fraction))) = all_consuming(number)(raw) else {
        return StageArg::Str(raw.to_string());
    };

    let parsed = if fraction.is_some() {
        raw.parse::<f64>().ok().map(StageArg::Float)
    } else {
        raw.parse::<i64>().ok().map(StageArg::Int)
    };

    parsed.unwrap_or_else(|| StageArg::Str(raw.to_string()))
}

/// Coerce every argument token
pub fn coerce_arguments<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<StageArg> {
    raw.into_iter().map(coerce_argument).collect()
}
