//! Filter Expression Parser
//!
//! Compiles flat tag filter expressions into a [`TagPredicate`].
//!
//! # Supported Syntax
//!
//! ```text
//! token ( ('&' | '|') token )*
//! token := key op value
//! key   := [a-zA-Z0-9-_.]+
//! op    := = | <= | >= | < | > | ~
//! ```
//!
//! There are no parentheses and no precedence between `&` and `|`: tokens
//! fold left to right, each new token wrapping the tree built so far.
//!
//! ```text
//! host=web1                 → host=web1
//! a=1|b=2&c=3               → And(Or(a=1, b=2), c=3)
//! region~us^*&rack>=r10     → And(region~us.*, rack>=r10)
//! ```

use crate::filter::{Predicate, TagComparison, TagOp, TagPredicate};
use crate::query::{QueryError, QueryResult};
use regex::Regex;
use std::sync::OnceLock;

fn token_grammar() -> &'static Regex {
    static GRAMMAR: OnceLock<Regex> = OnceLock::new();
    GRAMMAR.get_or_init(|| {
        Regex::new(r"^([a-zA-Z0-9\-_.]+)(=|<=|>=|<|>|~)(.*)$").expect("token grammar is valid")
    })
}

/// Parse a filter expression
///
/// Returns `Ok(None)` for an empty expression.
pub fn parse_filter_expression(input: &str) -> QueryResult<Option<TagPredicate>> {
    if input.is_empty() {
        return Ok(None);
    }

    let mut root: Option<TagPredicate> = None;

    for (separator, token) in split_tokens(input) {
        let leaf = Predicate::Leaf(parse_token(token)?);

        root = Some(match (root.take(), separator) {
            (None, _) => leaf,
            (Some(previous), Some('&')) => Predicate::and(previous, leaf),
            (Some(previous), _) => Predicate::or(previous, leaf),
        });
    }

    Ok(root)
}

/// Raw tokens of an expression, in order, without their separators
pub fn filter_tokens(input: &str) -> Vec<String> {
    if input.is_empty() {
        return Vec::new();
    }
    split_tokens(input)
        .into_iter()
        .map(|(_, token)| token.to_string())
        .collect()
}

/// Split on `&`/`|`, pairing each token with the separator before it
fn split_tokens(input: &str) -> Vec<(Option<char>, &str)> {
    let mut tokens = Vec::new();
    let mut separator = None;
    let mut start = 0;

    for (idx, c) in input.char_indices() {
        if c == '&' || c == '|' {
            tokens.push((separator, &input[start..idx]));
            separator = Some(c);
            start = idx + c.len_utf8();
        }
    }
    tokens.push((separator, &input[start..]));

    tokens
}

/// Parse a single `key op value` token
fn parse_token(token: &str) -> QueryResult<TagComparison> {
    let malformed = |reason: &str| QueryError::MalformedFilterExpression {
        token: token.to_string(),
        reason: reason.to_string(),
    };

    let captures = token_grammar()
        .captures(token)
        .ok_or_else(|| malformed("expected key followed by one of = <= >= < > ~ and a value"))?;

    let key = &captures[1];
    let op = TagOp::from_symbol(&captures[2]).ok_or_else(|| malformed("unknown operator"))?;
    let value = &captures[3];

    TagComparison::new(key, op, value)
}

impl Predicate<TagComparison> {
    /// Render the tree back into a filter expression
    ///
    /// Only left-deep trees with two-child combinators (the shape the parser
    /// produces) have an expression form; other shapes return `None`.
    pub fn to_expression(&self) -> Option<String> {
        match self {
            Predicate::Leaf(cmp) => Some(cmp.to_string()),
            Predicate::And(children) | Predicate::Or(children) => {
                let separator = if matches!(self, Predicate::And(_)) { '&' } else { '|' };
                let [left, right] = children.as_slice() else {
                    return None;
                };
                if right.is_combinator() {
                    return None;
                }
                Some(format!(
                    "{}{}{}",
                    left.to_expression()?,
                    separator,
                    right.to_expression()?
                ))
            }
        }
    }
}
