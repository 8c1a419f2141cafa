//! Structured-Filter Tree Builder
//!
//! Dashboards send filters already tokenized, as an ordered list of
//! elements that are either a tag string to match or a combinator marker:
//!
//! ```text
//! [{"value": "host=web1"}, {"value": "or", "type": "condition"}, {"value": "host=web2"}]
//!   → Or(Contains(host=web1), Contains(host=web2))
//! ```
//!
//! A combinator marker wraps whatever has been built so far as the first
//! child of a new `And`/`Or`; following tag strings are appended to that
//! combinator. Input that breaks this discipline is rejected.

use crate::filter::{Leaf, Predicate, StringPredicate};
use crate::query::{QueryError, QueryResult, TargetSeries};
use serde::{Deserialize, Serialize};

/// Matches when the series' `key=value` tag strings contain `value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contains {
    /// Tag string to look for
    pub value: String,
}

impl Contains {
    /// Create a containment check
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl Leaf for Contains {
    type Input = [String];

    fn matches(&self, tags: &[String]) -> bool {
        tags.iter().any(|t| *t == self.value)
    }
}

/// One element of a structured filter list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterElement {
    /// Tag string, or `and`/`or` for a combinator marker
    pub value: String,
    /// Present on combinator markers, whatever its value (even `null`)
    #[serde(
        rename = "type",
        default,
        deserialize_with = "key_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<serde_json::Value>,
}

/// `Some` whenever the key appears, so an explicit `null` still marks it
fn key_present<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

impl FilterElement {
    /// A tag string element
    pub fn tag(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            kind: None,
        }
    }

    /// A combinator marker element
    pub fn combinator(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            kind: Some(serde_json::Value::String("condition".to_string())),
        }
    }

    /// Whether this element is a combinator marker
    pub fn is_combinator(&self) -> bool {
        self.kind.is_some()
    }
}

/// Result of building a structured filter
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructuredFilter {
    /// The predicate tree, `None` when no elements were given
    pub predicate: Option<StringPredicate>,
    /// Tag string values in input order, echoed back to the dashboard
    pub values: Vec<String>,
}

/// Build a containment predicate tree from a structured filter list
pub fn build_structured_filter(elements: &[FilterElement]) -> QueryResult<StructuredFilter> {
    let mut stack: Vec<StringPredicate> = Vec::new();
    let mut values = Vec::new();

    for (position, element) in elements.iter().enumerate() {
        if element.is_combinator() {
            let top = stack
                .pop()
                .ok_or_else(|| reject(position, "combinator with no preceding filter"))?;

            let node = if element.value.eq_ignore_ascii_case("and") {
                Predicate::And(vec![top])
            } else if element.value.eq_ignore_ascii_case("or") {
                Predicate::Or(vec![top])
            } else {
                return Err(reject(
                    position,
                    &format!("unknown combinator '{}'", element.value),
                ));
            };
            stack.push(node);
        } else {
            values.push(element.value.clone());
            let leaf = Predicate::Leaf(Contains::new(element.value.as_str()));

            match stack.last_mut() {
                None => stack.push(leaf),
                Some(top) => {
                    if !top.push_child(leaf) {
                        return Err(reject(position, "filter value must follow a combinator"));
                    }
                }
            }
        }
    }

    if stack.len() > 1 {
        return Err(reject(elements.len(), "unbalanced filter list"));
    }

    Ok(StructuredFilter {
        predicate: stack.pop(),
        values,
    })
}

fn reject(position: usize, reason: &str) -> QueryError {
    tracing::warn!(position, reason, "Rejected structured filter");
    QueryError::MalformedStructuredFilter {
        position,
        reason: reason.to_string(),
    }
}

/// One dashboard target as sent in a query request
#[derive(Debug, Clone, Deserialize)]
pub struct StructuredTarget {
    /// Measurement name
    pub target: String,
    /// Value field name
    pub field: String,
    /// Tokenized filter list
    #[serde(default)]
    pub filters: Vec<FilterElement>,
    /// Whether the dashboard asked for correlated series
    #[serde(default)]
    pub correlate: bool,
}

impl StructuredTarget {
    /// Compile into a target series
    pub fn compile(&self) -> QueryResult<TargetSeries> {
        let filter = build_structured_filter(&self.filters)?;
        Ok(TargetSeries::structured(
            &self.target,
            &self.field,
            filter,
            self.correlate,
        ))
    }
}

#[derive(Debug, Deserialize)]
struct TargetsRequest {
    targets: Vec<StructuredTarget>,
}

/// Extract and compile every target of a dashboard query body
///
/// ```text
/// {"targets": [{"target": "cpu", "field": "usage", "filters": [...], "correlate": false}]}
/// ```
pub fn extract_targets(json: &str) -> QueryResult<Vec<TargetSeries>> {
    let request: TargetsRequest =
        serde_json::from_str(json).map_err(|e| QueryError::Json(e.to_string()))?;

    request
        .targets
        .iter()
        .map(StructuredTarget::compile)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::SeriesFilter;

    fn contains(value: &str) -> StringPredicate {
        Predicate::Leaf(Contains::new(value))
    }

    #[test]
    fn test_single_leaf() {
        let built = build_structured_filter(&[FilterElement::tag("host=web1")]).unwrap();
        assert_eq!(built.predicate, Some(contains("host=web1")));
        assert_eq!(built.values, vec!["host=web1"]);
    }

    #[test]
    fn test_empty_list() {
        let built = build_structured_filter(&[]).unwrap();
        assert!(built.predicate.is_none());
        assert!(built.values.is_empty());
    }

    #[test]
    fn test_combinator_accumulates_children() {
        let elements = vec![
            FilterElement::tag("a"),
            FilterElement::combinator("OR"),
            FilterElement::tag("b"),
            FilterElement::tag("c"),
        ];
        let built = build_structured_filter(&elements).unwrap();
        assert_eq!(
            built.predicate,
            Some(Predicate::Or(vec![contains("a"), contains("b"), contains("c")]))
        );
        assert_eq!(built.values, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_nested_combinators() {
        let elements = vec![
            FilterElement::tag("a"),
            FilterElement::combinator("and"),
            FilterElement::tag("b"),
            FilterElement::combinator("or"),
            FilterElement::tag("c"),
        ];
        let built = build_structured_filter(&elements).unwrap();
        assert_eq!(
            built.predicate,
            Some(Predicate::Or(vec![
                Predicate::And(vec![contains("a"), contains("b")]),
                contains("c"),
            ]))
        );
    }

    #[test]
    fn test_rejects_leading_combinator() {
        let err = build_structured_filter(&[FilterElement::combinator("and")]).unwrap_err();
        assert!(matches!(
            err,
            QueryError::MalformedStructuredFilter { position: 0, .. }
        ));
    }

    #[test]
    fn test_rejects_unknown_combinator() {
        let elements = vec![FilterElement::tag("a"), FilterElement::combinator("xor")];
        assert!(build_structured_filter(&elements).is_err());
    }

    #[test]
    fn test_rejects_adjacent_leaves() {
        let elements = vec![FilterElement::tag("a"), FilterElement::tag("b")];
        let err = build_structured_filter(&elements).unwrap_err();
        assert!(matches!(
            err,
            QueryError::MalformedStructuredFilter { position: 1, .. }
        ));
    }

    #[test]
    fn test_element_json() {
        let elements: Vec<FilterElement> =
            serde_json::from_str(r#"[{"value": "host=a"}, {"value": "and", "type": "condition"}]"#)
                .unwrap();
        assert!(!elements[0].is_combinator());
        assert!(elements[1].is_combinator());
    }

    #[test]
    fn test_null_type_still_marks_combinator() {
        let elements: Vec<FilterElement> = serde_json::from_str(
            r#"[{"value": "a"}, {"value": "or", "type": null}, {"value": "b"}]"#,
        )
        .unwrap();
        assert!(elements[1].is_combinator());

        let built = build_structured_filter(&elements).unwrap();
        assert_eq!(
            built.predicate,
            Some(Predicate::Or(vec![contains("a"), contains("b")]))
        );
    }

    #[test]
    fn test_extract_targets() {
        let json = r#"{
            "targets": [
                {"target": "cpu", "field": "usage", "correlate": true,
                 "filters": [{"value": "host=web1"}, {"value": "or", "type": "condition"}, {"value": "host=web2"}]},
                {"target": "mem", "field": "free", "filters": []}
            ]
        }"#;
        let targets = extract_targets(json).unwrap();
        assert_eq!(targets.len(), 2);

        assert_eq!(targets[0].measurement, "cpu");
        assert_eq!(targets[0].field, "usage");
        assert!(targets[0].correlate);
        assert_eq!(targets[0].filter_elements, vec!["host=web1", "host=web2"]);
        assert_eq!(
            targets[0].filter,
            Some(SeriesFilter::Structured(Predicate::Or(vec![
                contains("host=web1"),
                contains("host=web2"),
            ])))
        );

        assert!(targets[1].filter.is_none());
        assert!(!targets[1].correlate);
    }

    #[test]
    fn test_extract_targets_invalid_json() {
        assert!(matches!(
            extract_targets("{\"targets\": 5}"),
            Err(QueryError::Json(_))
        ));
    }
}
