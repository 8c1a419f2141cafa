//! Series Filters
//!
//! Boolean predicate trees that decide which stored series a query reads:
//!
//! - **tag**: typed key/op/value comparisons over a series' tag map
//! - **expression**: compiles flat `host=web1&region~us^*` expressions
//! - **structured**: compiles the tokenized filter lists sent by dashboards
//!
//! Both builders produce the same n-ary [`Predicate`] node type. The
//! expression parser only ever creates two-child `And`/`Or` nodes, folded
//! strictly left to right; the structured builder appends children to the
//! current combinator.
//!
//! # Example
//!
//! ```text
//! a=1|b=2&c=3   →   And(Or(a=1, b=2), c=3)
//! ```

mod expression;
mod structured;
mod tag;

pub use expression::{filter_tokens, parse_filter_expression};
pub use structured::{
    build_structured_filter, extract_targets, Contains, FilterElement, StructuredFilter,
    StructuredTarget,
};
pub use tag::{rewrite_like_pattern, TagComparison, TagOp};

use serde::Serialize;
use std::collections::BTreeMap;

/// A leaf condition that can be evaluated against some input
pub trait Leaf {
    /// What the condition inspects
    type Input: ?Sized;

    /// Evaluate the condition
    fn matches(&self, input: &Self::Input) -> bool;
}

/// Boolean predicate tree with n-ary combinators
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Predicate<L> {
    /// A single condition
    Leaf(L),
    /// All children must match
    And(Vec<Predicate<L>>),
    /// At least one child must match
    Or(Vec<Predicate<L>>),
}

impl<L> Predicate<L> {
    /// Two-child conjunction
    pub fn and(left: Self, right: Self) -> Self {
        Predicate::And(vec![left, right])
    }

    /// Two-child disjunction
    pub fn or(left: Self, right: Self) -> Self {
        Predicate::Or(vec![left, right])
    }

    /// Whether this node is `And` or `Or`
    pub fn is_combinator(&self) -> bool {
        !matches!(self, Predicate::Leaf(_))
    }

    /// Children of a combinator (empty for a leaf)
    pub fn children(&self) -> &[Predicate<L>] {
        match self {
            Predicate::Leaf(_) => &[],
            Predicate::And(children) | Predicate::Or(children) => children,
        }
    }

    /// Append a child to a combinator
    ///
    /// Returns false (and drops the child) when called on a leaf.
    pub fn push_child(&mut self, child: Self) -> bool {
        match self {
            Predicate::Leaf(_) => false,
            Predicate::And(children) | Predicate::Or(children) => {
                children.push(child);
                true
            }
        }
    }

    /// All leaves in depth-first order
    pub fn leaves(&self) -> Vec<&L> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a L>) {
        match self {
            Predicate::Leaf(leaf) => out.push(leaf),
            Predicate::And(children) | Predicate::Or(children) => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }
}

impl<L: Leaf> Predicate<L> {
    /// Evaluate the tree against an input
    pub fn evaluate(&self, input: &L::Input) -> bool {
        match self {
            Predicate::Leaf(leaf) => leaf.matches(input),
            Predicate::And(children) => children.iter().all(|c| c.evaluate(input)),
            Predicate::Or(children) => children.iter().any(|c| c.evaluate(input)),
        }
    }
}

/// Predicate tree over tag comparisons, built by the expression parser
pub type TagPredicate = Predicate<TagComparison>;

/// Predicate tree over tag-string containment, built from dashboard filters
pub type StringPredicate = Predicate<Contains>;

/// The compiled series filter of a target
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesFilter {
    /// Compiled from a flat filter expression
    Expression(TagPredicate),
    /// Compiled from a structured dashboard filter list
    Structured(StringPredicate),
}

impl SeriesFilter {
    /// Check whether a series with these tags is selected
    pub fn matches(&self, tags: &BTreeMap<String, String>) -> bool {
        match self {
            SeriesFilter::Expression(predicate) => predicate.evaluate(tags),
            SeriesFilter::Structured(predicate) => {
                let tag_strings = crate::storage::tag_list(tags);
                predicate.evaluate(tag_strings.as_slice())
            }
        }
    }
}
