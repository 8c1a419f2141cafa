//! Tag comparisons
//!
//! A comparison is one `key op value` triple evaluated against a series'
//! tag map. Ordering operators compare tag values lexicographically.
//! `LIKE` (`~`) is a whole-value regular-expression match; because `.`
//! separates query segments, patterns spell the single-character wildcard
//! as `^` and it is rewritten to `.` when the comparison is built.

use crate::filter::Leaf;
use crate::query::{QueryError, QueryResult};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

/// Comparison operators for tag values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TagOp {
    /// Equal to
    Eq,
    /// Greater than or equal to
    Ge,
    /// Greater than
    Gt,
    /// Less than or equal to
    Le,
    /// Less than
    Lt,
    /// Regular-expression match
    Like,
}

impl TagOp {
    /// Parse from the expression symbol
    pub fn from_symbol(s: &str) -> Option<Self> {
        match s {
            "=" => Some(Self::Eq),
            ">=" => Some(Self::Ge),
            ">" => Some(Self::Gt),
            "<=" => Some(Self::Le),
            "<" => Some(Self::Lt),
            "~" => Some(Self::Like),
            _ => None,
        }
    }

    /// The expression symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ge => ">=",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Lt => "<",
            Self::Like => "~",
        }
    }
}

impl std::fmt::Display for TagOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Rewrite the `^` wildcard of a LIKE pattern into `.`
pub fn rewrite_like_pattern(pattern: &str) -> String {
    pattern.replace('^', ".")
}

/// One `key op value` tag comparison
#[derive(Debug, Clone, Serialize)]
pub struct TagComparison {
    /// Tag key
    pub key: String,
    /// Comparison operator
    pub op: TagOp,
    /// Literal value, or the rewritten pattern for `Like`
    pub value: String,
    #[serde(skip)]
    pattern: Option<Regex>,
}

impl TagComparison {
    /// Build a comparison; `Like` values are rewritten and compiled
    pub fn new(key: impl Into<String>, op: TagOp, value: impl Into<String>) -> QueryResult<Self> {
        let key = key.into();
        let mut value = value.into();

        let pattern = if op == TagOp::Like {
            value = rewrite_like_pattern(&value);
            let compiled = Regex::new(&format!("^(?:{})$", value)).map_err(|e| {
                QueryError::MalformedFilterExpression {
                    token: format!("{}{}{}", key, op, value),
                    reason: format!("invalid pattern: {}", e),
                }
            })?;
            Some(compiled)
        } else {
            None
        };

        Ok(Self {
            key,
            op,
            value,
            pattern,
        })
    }

    /// Compare a single tag value
    pub fn matches_value(&self, actual: &str) -> bool {
        let expected = self.value.as_str();
        match self.op {
            TagOp::Eq => actual == expected,
            TagOp::Ge => actual >= expected,
            TagOp::Gt => actual > expected,
            TagOp::Le => actual <= expected,
            TagOp::Lt => actual < expected,
            TagOp::Like => self
                .pattern
                .as_ref()
                .map(|re| re.is_match(actual))
                .unwrap_or(false),
        }
    }
}

impl Leaf for TagComparison {
    type Input = BTreeMap<String, String>;

    fn matches(&self, tags: &Self::Input) -> bool {
        tags.get(&self.key)
            .map(|actual| self.matches_value(actual))
            .unwrap_or(false)
    }
}

impl PartialEq for TagComparison {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.op == other.op && self.value == other.value
    }
}

impl std::fmt::Display for TagComparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.key, self.op, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_rewrites_only_caret() {
        let cmp = TagComparison::new("region", TagOp::Like, "us^east^*[0-9]+$").unwrap();
        assert_eq!(cmp.value, "us.east.*[0-9]+$");
        assert_eq!(rewrite_like_pattern("a^b.c*"), "a.b.c*");
    }

    #[test]
    fn test_like_matches_whole_value() {
        let cmp = TagComparison::new("region", TagOp::Like, "us^*").unwrap();
        assert!(cmp.matches_value("us-east"));
        assert!(!cmp.matches_value("eu-us-east"));
    }

    #[test]
    fn test_invalid_like_pattern() {
        let err = TagComparison::new("region", TagOp::Like, "us(").unwrap_err();
        assert!(matches!(err, QueryError::MalformedFilterExpression { .. }));
    }

    #[test]
    fn test_ordering_operators() {
        let ge = TagComparison::new("rack", TagOp::Ge, "b").unwrap();
        assert!(ge.matches_value("b"));
        assert!(ge.matches_value("c"));
        assert!(!ge.matches_value("a"));

        let lt = TagComparison::new("rack", TagOp::Lt, "b").unwrap();
        assert!(lt.matches_value("a"));
        assert!(!lt.matches_value("b"));
    }

    #[test]
    fn test_missing_key_never_matches() {
        let cmp = TagComparison::new("host", TagOp::Le, "zzz").unwrap();
        assert!(!cmp.matches(&BTreeMap::new()));
    }

    #[test]
    fn test_symbols() {
        for op in [TagOp::Eq, TagOp::Ge, TagOp::Gt, TagOp::Le, TagOp::Lt, TagOp::Like] {
            assert_eq!(TagOp::from_symbol(op.symbol()), Some(op));
        }
        assert_eq!(TagOp::from_symbol("!="), None);
    }
}
