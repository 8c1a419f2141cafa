//! Core data types shared by the query layer and the storage collaborator
//!
//! - `DataPoint`: a single timestamped value, integer or floating point
//! - `SeriesValue`: the decoded number carried by a point
//! - `TimeRange`: a time interval for queries
//! - `Series`: one stored series with its identity and tags

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single time-series data point
///
/// The value is always held as a 64-bit integer. When `fp` is set the
/// integer is the IEEE-754 bit pattern of an `f64`, which keeps floating
/// values lossless as they move through the long-valued pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataPoint {
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    /// Whether `raw` holds the bits of a double
    pub fp: bool,
    /// Integer value, or the bit pattern of a double when `fp` is set
    pub raw: i64,
}

impl DataPoint {
    /// Create an integer-valued point
    pub fn from_long(timestamp: i64, value: i64) -> Self {
        Self {
            timestamp,
            fp: false,
            raw: value,
        }
    }

    /// Create a floating-point point
    pub fn from_double(timestamp: i64, value: f64) -> Self {
        Self {
            timestamp,
            fp: true,
            raw: value.to_bits() as i64,
        }
    }

    /// Create a point from a decoded value
    pub fn from_value(timestamp: i64, value: SeriesValue) -> Self {
        match value {
            SeriesValue::Int(v) => Self::from_long(timestamp, v),
            SeriesValue::Float(v) => Self::from_double(timestamp, v),
        }
    }

    /// Whether the point carries a floating-point value
    pub fn is_fp(&self) -> bool {
        self.fp
    }

    /// Raw integer value (meaningful when `fp` is false)
    pub fn long_value(&self) -> i64 {
        self.raw
    }

    /// Decode the stored bit pattern as a double (meaningful when `fp` is true)
    pub fn double_value(&self) -> f64 {
        f64::from_bits(self.raw as u64)
    }

    /// Numeric value as `f64` regardless of representation
    pub fn as_f64(&self) -> f64 {
        if self.fp {
            self.double_value()
        } else {
            self.raw as f64
        }
    }

    /// Decoded value
    pub fn value(&self) -> SeriesValue {
        if self.fp {
            SeriesValue::Float(self.double_value())
        } else {
            SeriesValue::Int(self.raw)
        }
    }

    /// Same timestamp, new integer value
    pub fn with_long(self, value: i64) -> Self {
        Self::from_long(self.timestamp, value)
    }

    /// Same timestamp, new floating-point value
    pub fn with_double(self, value: f64) -> Self {
        Self::from_double(self.timestamp, value)
    }
}

/// A decoded point value as it appears in client output
///
/// Serializes as a bare JSON number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeriesValue {
    /// Integer value
    Int(i64),
    /// Floating-point value
    Float(f64),
}

impl SeriesValue {
    /// Value widened to `f64`
    pub fn as_f64(&self) -> f64 {
        match self {
            SeriesValue::Int(v) => *v as f64,
            SeriesValue::Float(v) => *v,
        }
    }
}

impl std::fmt::Display for SeriesValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeriesValue::Int(v) => write!(f, "{}", v),
            SeriesValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Time range for queries (half-open interval: [start, end))
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start timestamp (inclusive), in milliseconds
    pub start: i64,
    /// End timestamp (exclusive), in milliseconds
    pub end: i64,
}

impl TimeRange {
    /// Create a time range, returning None if start >= end
    pub fn try_new(start: i64, end: i64) -> Option<Self> {
        if start < end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// The widest representable range
    pub fn all() -> Self {
        Self {
            start: i64::MIN,
            end: i64::MAX,
        }
    }

    /// Check if a timestamp falls within this range
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp < self.end
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// One stored series: identity string, tags and ordered points
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    /// Series identity returned to clients as the output target
    pub key: String,
    /// Tag key/value pairs
    pub tags: BTreeMap<String, String>,
    /// Points in storage order
    pub points: Vec<DataPoint>,
}

impl Series {
    /// Create an empty series
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            tags: BTreeMap::new(),
            points: Vec::new(),
        }
    }

    /// Builder method: add a tag
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Builder method: append a point
    pub fn point(mut self, point: DataPoint) -> Self {
        self.points.push(point);
        self
    }

    /// Tags rendered as `key=value` strings, sorted by key
    pub fn tag_list(&self) -> Vec<String> {
        tag_list(&self.tags)
    }
}

/// Render a tag map as `key=value` strings
pub fn tag_list(tags: &BTreeMap<String, String>) -> Vec<String> {
    tags.iter().map(|(k, v)| format!("{}={}", k, v)).collect()
}
