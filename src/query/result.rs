//! Result Assembler
//!
//! Turns per-series point sequences into the client output shape:
//!
//! ```text
//! [{"target": "web1", "datapoints": [[60, 100], [61.5, 160]]}]
//! ```
//!
//! Each datapoint is `[value, timestamp]`, value decoded from its integer
//! or floating representation.

use crate::storage::{DataPoint, SeriesValue};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::io::Write;

/// One output series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSeries {
    /// Series identity
    pub target: String,
    /// `(value, timestamp)` pairs
    pub datapoints: Vec<(SeriesValue, i64)>,
}

impl OutputSeries {
    /// Decode points in their given order
    pub fn from_points(target: impl Into<String>, points: &[DataPoint]) -> Self {
        Self {
            target: target.into(),
            datapoints: points.iter().map(|p| (p.value(), p.timestamp)).collect(),
        }
    }

    /// Stable ascending sort by timestamp
    pub fn sort(&mut self) {
        self.datapoints.sort_by_key(|(_, timestamp)| *timestamp);
    }

    /// Order by target name
    pub fn cmp_target(&self, other: &Self) -> Ordering {
        self.target.cmp(&other.target)
    }

    pub fn len(&self) -> usize {
        self.datapoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datapoints.is_empty()
    }
}

/// Build sorted output from the store's per-series points
pub fn assemble(series: BTreeMap<String, Vec<DataPoint>>) -> Vec<OutputSeries> {
    let mut output: Vec<OutputSeries> = series
        .into_iter()
        .map(|(target, points)| {
            let mut out = OutputSeries::from_points(target, &points);
            out.sort();
            out
        })
        .collect();
    sort_by_target(&mut output);
    output
}

/// Deterministic client ordering
pub fn sort_by_target(series: &mut [OutputSeries]) {
    series.sort_by(OutputSeries::cmp_target);
}

#[derive(Serialize)]
struct CsvRow<'a> {
    target: &'a str,
    timestamp: i64,
    value: String,
}

/// Write `target,timestamp,value` rows
pub fn write_csv<W: Write>(series: &[OutputSeries], writer: W) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    for s in series {
        for (value, timestamp) in &s.datapoints {
            wtr.serialize(CsvRow {
                target: &s.target,
                timestamp: *timestamp,
                value: value.to_string(),
            })?;
        }
    }

    wtr.flush()?;
    Ok(())
}
