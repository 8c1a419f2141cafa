//! Compiled query representation
//!
//! A [`TargetSeries`] is what a query string or a dashboard target compiles
//! to: which measurement and field to read, which series to keep, and which
//! stages to run over their points. It is immutable once built and can be
//! shared between executions.

use crate::filter::{SeriesFilter, StructuredFilter, TagPredicate};
use crate::stage::{ExecutionMode, StageChain};
use serde::Serialize;

/// A compiled query target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetSeries {
    /// Measurement name
    pub measurement: String,
    /// Value field name
    pub field: String,
    /// Verbatim lookback prefix (e.g. `1h<`), when the query had one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookback: Option<String>,
    /// Series filter, absent when every series is selected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<SeriesFilter>,
    /// Raw filter tokens or structured values, in input order
    pub filter_elements: Vec<String>,
    /// Whether correlated series were requested
    pub correlate: bool,
    /// Stage chain, absent when the query had no `=>` segments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stages: Option<StageChain>,
}

impl TargetSeries {
    /// Target reading every series of `measurement.field`
    pub fn new(measurement: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            field: field.into(),
            lookback: None,
            filter: None,
            filter_elements: Vec::new(),
            correlate: false,
            stages: None,
        }
    }

    /// Target built from a dashboard's structured filter
    pub fn structured(
        measurement: impl Into<String>,
        field: impl Into<String>,
        filter: StructuredFilter,
        correlate: bool,
    ) -> Self {
        Self {
            filter: filter.predicate.map(SeriesFilter::Structured),
            filter_elements: filter.values,
            correlate,
            ..Self::new(measurement, field)
        }
    }

    /// Set an expression filter and its raw tokens
    pub fn with_expression(mut self, predicate: Option<TagPredicate>, tokens: Vec<String>) -> Self {
        self.filter = predicate.map(SeriesFilter::Expression);
        self.filter_elements = tokens;
        self
    }

    /// Set the stage chain
    pub fn with_stages(mut self, stages: StageChain) -> Self {
        self.stages = Some(stages);
        self
    }

    /// Set the lookback prefix
    pub fn with_lookback(mut self, lookback: impl Into<String>) -> Self {
        self.lookback = Some(lookback.into());
        self
    }

    /// Execution model the stage chain supports, if there is one
    pub fn execution_mode(&self) -> Option<ExecutionMode> {
        self.stages.as_ref().map(|chain| chain.mode)
    }

    /// `measurement.field` label used in logs
    pub fn selector(&self) -> String {
        format!("{}.{}", self.measurement, self.field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Contains, Predicate};

    #[test]
    fn test_structured_target() {
        let filter = StructuredFilter {
            predicate: Some(Predicate::Leaf(Contains::new("host=a"))),
            values: vec!["host=a".into()],
        };
        let target = TargetSeries::structured("cpu", "usage", filter, true);
        assert!(matches!(target.filter, Some(SeriesFilter::Structured(_))));
        assert_eq!(target.filter_elements, vec!["host=a"]);
        assert!(target.correlate);
        assert_eq!(target.selector(), "cpu.usage");
    }

    #[test]
    fn test_serialize_omits_absent_parts() {
        let json = serde_json::to_value(TargetSeries::new("cpu", "usage")).unwrap();
        assert_eq!(json["measurement"], "cpu");
        assert!(json.get("filter").is_none());
        assert!(json.get("stages").is_none());
        assert!(TargetSeries::new("cpu", "usage").execution_mode().is_none());
    }

    #[test]
    fn test_target_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TargetSeries>();
    }
}
