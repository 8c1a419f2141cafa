//! Windowed aggregation stages
//!
//! Points are grouped into fixed, epoch-aligned buckets of the window
//! length and each bucket collapses to one point stamped with the bucket
//! start. Buckets are emitted in ascending order.
//!
//! ```text
//! window 60s:  (5s, 1) (30s, 3) (65s, 10)  →  mean  →  (0s, 2.0) (60s, 10.0)
//! ```

use crate::query::{QueryError, QueryResult};
use crate::stage::StageArg;
use crate::storage::DataPoint;
use serde::Serialize;
use std::collections::BTreeMap;

/// Aggregation functions available to window stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationFunc {
    /// Average of values
    Avg,
    /// Sum of values
    Sum,
    /// Minimum value
    Min,
    /// Maximum value
    Max,
    /// Count of values
    Count,
    /// Last value in the window
    Last,
    /// First value in the window
    First,
}

impl AggregationFunc {
    /// Apply aggregation to a slice of values
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }

        Some(match self {
            Self::Avg => values.iter().sum::<f64>() / values.len() as f64,
            Self::Sum => values.iter().sum(),
            Self::Min => values.iter().cloned().fold(f64::INFINITY, f64::min),
            Self::Max => values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            Self::Count => values.len() as f64,
            Self::Last => *values.last()?,
            Self::First => *values.first()?,
        })
    }

    /// Aggregate integer points without leaving integer arithmetic
    ///
    /// Returns `None` for `Avg`, whose result is always floating.
    fn apply_long(&self, points: &[DataPoint]) -> Option<i64> {
        let values = points.iter().map(|p| p.long_value());
        match self {
            Self::Sum => Some(values.fold(0i64, i64::wrapping_add)),
            Self::Min => values.min(),
            Self::Max => values.max(),
            Self::Count => Some(points.len() as i64),
            Self::Last => points.last().map(|p| p.long_value()),
            Self::First => points.first().map(|p| p.long_value()),
            Self::Avg => None,
        }
    }
}

/// Fixed-window aggregation over a whole point buffer
#[derive(Debug, Clone, PartialEq)]
pub struct WindowAggregate {
    func: AggregationFunc,
    window_ms: i64,
}

impl WindowAggregate {
    /// Build from the window length in seconds
    pub fn new(stage: &str, func: AggregationFunc, arg: &StageArg) -> QueryResult<Self> {
        let invalid = |reason: String| QueryError::InvalidStageArgument {
            stage: stage.to_string(),
            reason,
        };

        let seconds = arg
            .as_i64()
            .ok_or_else(|| invalid(format!("window '{}' is not an integer", arg)))?;
        if seconds <= 0 {
            return Err(invalid(format!("window '{}' must be positive", arg)));
        }
        let window_ms = seconds
            .checked_mul(1000)
            .ok_or_else(|| invalid(format!("window '{}' is too large", arg)))?;

        Ok(Self { func, window_ms })
    }

    /// Start of the bucket containing `timestamp`
    pub fn bucket_start(&self, timestamp: i64) -> i64 {
        timestamp.div_euclid(self.window_ms) * self.window_ms
    }

    /// Aggregate a buffer into one point per non-empty bucket
    pub fn apply(&self, points: Vec<DataPoint>) -> Vec<DataPoint> {
        let mut buckets: BTreeMap<i64, Vec<DataPoint>> = BTreeMap::new();
        for point in points {
            buckets
                .entry(self.bucket_start(point.timestamp))
                .or_default()
                .push(point);
        }

        buckets
            .into_iter()
            .filter_map(|(start, bucket)| self.collapse(start, &bucket))
            .collect()
    }

    fn collapse(&self, start: i64, bucket: &[DataPoint]) -> Option<DataPoint> {
        if self.func == AggregationFunc::Count {
            return Some(DataPoint::from_long(start, bucket.len() as i64));
        }

        if bucket.iter().all(|p| !p.is_fp()) {
            if let Some(value) = self.func.apply_long(bucket) {
                return Some(DataPoint::from_long(start, value));
            }
        }

        let values: Vec<f64> = bucket.iter().map(|p| p.as_f64()).collect();
        self.func
            .apply(&values)
            .map(|value| DataPoint::from_double(start, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(func: AggregationFunc, seconds: i64) -> WindowAggregate {
        WindowAggregate::new("test", func, &StageArg::Int(seconds)).unwrap()
    }

    fn sample() -> Vec<DataPoint> {
        vec![
            DataPoint::from_long(65_000, 10),
            DataPoint::from_long(5_000, 1),
            DataPoint::from_long(30_000, 3),
        ]
    }

    #[test]
    fn test_aggregation_apply() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];

        assert_eq!(AggregationFunc::Avg.apply(&values), Some(3.0));
        assert_eq!(AggregationFunc::Sum.apply(&values), Some(15.0));
        assert_eq!(AggregationFunc::Min.apply(&values), Some(1.0));
        assert_eq!(AggregationFunc::Max.apply(&values), Some(5.0));
        assert_eq!(AggregationFunc::Count.apply(&values), Some(5.0));
        assert_eq!(AggregationFunc::First.apply(&values), Some(1.0));
        assert_eq!(AggregationFunc::Last.apply(&values), Some(5.0));
        assert_eq!(AggregationFunc::Sum.apply(&[]), None);
    }

    #[test]
    fn test_mean_buckets_ascending() {
        let out = window(AggregationFunc::Avg, 60).apply(sample());
        assert_eq!(
            out,
            vec![
                DataPoint::from_double(0, 2.0),
                DataPoint::from_double(60_000, 10.0)
            ]
        );
    }

    #[test]
    fn test_integer_results_stay_integer() {
        let out = window(AggregationFunc::Sum, 60).apply(sample());
        assert_eq!(
            out,
            vec![DataPoint::from_long(0, 4), DataPoint::from_long(60_000, 10)]
        );

        let out = window(AggregationFunc::Max, 60).apply(sample());
        assert_eq!(out[0], DataPoint::from_long(0, 3));
    }

    #[test]
    fn test_mixed_bucket_is_floating() {
        let points = vec![DataPoint::from_long(0, 1), DataPoint::from_double(1, 0.5)];
        let out = window(AggregationFunc::Sum, 10).apply(points);
        assert_eq!(out, vec![DataPoint::from_double(0, 1.5)]);
    }

    #[test]
    fn test_count_is_integer() {
        let points = vec![DataPoint::from_double(0, 1.0), DataPoint::from_double(1, 2.0)];
        let out = window(AggregationFunc::Count, 10).apply(points);
        assert_eq!(out, vec![DataPoint::from_long(0, 2)]);
    }

    #[test]
    fn test_first_last_follow_input_order() {
        let first = window(AggregationFunc::First, 60).apply(sample());
        let last = window(AggregationFunc::Last, 60).apply(sample());
        assert_eq!(first[0].long_value(), 1);
        assert_eq!(last[0].long_value(), 3);
    }

    #[test]
    fn test_negative_timestamps_align_down() {
        let w = window(AggregationFunc::Count, 60);
        assert_eq!(w.bucket_start(-1), -60_000);
        assert_eq!(w.bucket_start(0), 0);
    }

    #[test]
    fn test_invalid_windows() {
        for arg in [
            StageArg::Int(0),
            StageArg::Float(1.5),
            StageArg::Str("1m".into()),
            StageArg::Int(i64::MAX),
        ] {
            let err = WindowAggregate::new("mean", AggregationFunc::Avg, &arg).unwrap_err();
            assert!(matches!(err, QueryError::InvalidStageArgument { .. }));
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(window(AggregationFunc::Sum, 1).apply(Vec::new()).is_empty());
    }
}
