//! In-process series store
//!
//! Holds series in nested maps (db → measurement → field → series) and
//! answers `query_points` by evaluating the compiled series filter against
//! each series' tags. Used by tests, benchmarks and the CLI `run` command,
//! where it can be loaded from a JSON file:
//!
//! ```text
//! [
//!   {"db": "metrics", "measurement": "cpu", "field": "usage",
//!    "key": "web1", "tags": {"host": "web1"},
//!    "points": [{"timestamp": 100, "value": 50}, {"timestamp": 200, "value": 2.5}]}
//! ]
//! ```

use crate::filter::SeriesFilter;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{tag_list, DataPoint, Series, SeriesValue, TimeRange};
use crate::storage::SeriesStore;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

type FieldMap = BTreeMap<String, Vec<Series>>;
type MeasurementMap = BTreeMap<String, FieldMap>;

/// In-memory implementation of [`SeriesStore`]
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    databases: BTreeMap<String, MeasurementMap>,
}

/// One series entry of the JSON data file
#[derive(Debug, Deserialize)]
struct SeriesRecord {
    db: String,
    measurement: String,
    field: String,
    key: String,
    #[serde(default)]
    tags: BTreeMap<String, String>,
    #[serde(default)]
    points: Vec<PointRecord>,
}

#[derive(Debug, Deserialize)]
struct PointRecord {
    timestamp: i64,
    value: SeriesValue,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a series under db/measurement/field
    pub fn insert_series(
        &mut self,
        db: impl Into<String>,
        measurement: impl Into<String>,
        field: impl Into<String>,
        series: Series,
    ) {
        self.databases
            .entry(db.into())
            .or_default()
            .entry(measurement.into())
            .or_default()
            .entry(field.into())
            .or_default()
            .push(series);
    }

    /// Load a store from a JSON reader
    pub fn from_reader<R: Read>(reader: R) -> StorageResult<Self> {
        let records: Vec<SeriesRecord> = serde_json::from_reader(reader)?;
        let mut store = Self::new();

        for record in records {
            let series = Series {
                key: record.key,
                tags: record.tags,
                points: record
                    .points
                    .into_iter()
                    .map(|p| DataPoint::from_value(p.timestamp, p.value))
                    .collect(),
            };
            store.insert_series(record.db, record.measurement, record.field, series);
        }

        Ok(store)
    }

    /// Load a store from a JSON file
    pub fn load(path: &Path) -> StorageResult<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Number of stored series across all databases
    pub fn series_count(&self) -> usize {
        self.databases
            .values()
            .flat_map(|m| m.values())
            .flat_map(|f| f.values())
            .map(Vec::len)
            .sum()
    }

    fn series_for(&self, db: &str, measurement: &str, field: &str) -> StorageResult<&[Series]> {
        let measurements = self
            .databases
            .get(db)
            .ok_or_else(|| StorageError::DatabaseNotFound(db.to_string()))?;

        let fields = measurements
            .get(measurement)
            .ok_or_else(|| StorageError::MeasurementNotFound {
                db: db.to_string(),
                measurement: measurement.to_string(),
            })?;

        fields
            .get(field)
            .map(Vec::as_slice)
            .ok_or_else(|| StorageError::FieldNotFound {
                measurement: measurement.to_string(),
                field: field.to_string(),
            })
    }
}

impl SeriesStore for MemoryStore {
    fn query_points(
        &self,
        db: &str,
        measurement: &str,
        field: &str,
        range: TimeRange,
        tag_list_filter: &[String],
        filter: Option<&SeriesFilter>,
    ) -> StorageResult<BTreeMap<String, Vec<DataPoint>>> {
        if range.start >= range.end {
            return Err(StorageError::InvalidTimeRange);
        }

        let mut result = BTreeMap::new();

        for series in self.series_for(db, measurement, field)? {
            let selected = match filter {
                Some(filter) => filter.matches(&series.tags),
                None => {
                    let tags = tag_list(&series.tags);
                    tag_list_filter.iter().all(|t| tags.contains(t))
                }
            };
            if !selected {
                continue;
            }

            let points: Vec<DataPoint> = series
                .points
                .iter()
                .filter(|p| range.contains(p.timestamp))
                .copied()
                .collect();

            result
                .entry(series.key.clone())
                .or_insert_with(Vec::new)
                .extend(points);
        }

        tracing::debug!(
            db = %db,
            measurement = %measurement,
            field = %field,
            series = result.len(),
            "Memory store query"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::parse_filter_expression;

    fn sample_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.insert_series(
            "metrics",
            "cpu",
            "usage",
            Series::new("web1")
                .tag("host", "web1")
                .tag("region", "us-east")
                .point(DataPoint::from_long(100, 50))
                .point(DataPoint::from_long(200, 55)),
        );
        store.insert_series(
            "metrics",
            "cpu",
            "usage",
            Series::new("db1")
                .tag("host", "db1")
                .tag("region", "eu-west")
                .point(DataPoint::from_double(100, 1.5)),
        );
        store
    }

    #[test]
    fn test_query_all_series() {
        let store = sample_store();
        let result = store
            .query_points("metrics", "cpu", "usage", TimeRange::all(), &[], None)
            .unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result["web1"].len(), 2);
    }

    #[test]
    fn test_query_with_expression_filter() {
        let store = sample_store();
        let filter = SeriesFilter::Expression(parse_filter_expression("host=web1").unwrap().unwrap());
        let result = store
            .query_points("metrics", "cpu", "usage", TimeRange::all(), &[], Some(&filter))
            .unwrap();
        assert_eq!(result.keys().collect::<Vec<_>>(), vec!["web1"]);
    }

    #[test]
    fn test_query_with_tag_list() {
        let store = sample_store();
        let tags = vec!["region=eu-west".to_string()];
        let result = store
            .query_points("metrics", "cpu", "usage", TimeRange::all(), &tags, None)
            .unwrap();
        assert_eq!(result.keys().collect::<Vec<_>>(), vec!["db1"]);
    }

    #[test]
    fn test_query_time_range() {
        let store = sample_store();
        let range = TimeRange::try_new(150, 300).unwrap();
        let result = store
            .query_points("metrics", "cpu", "usage", range, &[], None)
            .unwrap();
        assert_eq!(result["web1"], vec![DataPoint::from_long(200, 55)]);
        assert!(result["db1"].is_empty());
    }

    #[test]
    fn test_not_found() {
        let store = sample_store();
        let err = store
            .query_points("metrics", "mem", "usage", TimeRange::all(), &[], None)
            .unwrap_err();
        assert!(matches!(err, StorageError::MeasurementNotFound { .. }));

        let err = store
            .query_points("other", "cpu", "usage", TimeRange::all(), &[], None)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"[
            {"db": "metrics", "measurement": "cpu", "field": "usage", "key": "web1",
             "tags": {"host": "web1"},
             "points": [{"timestamp": 100, "value": 50}, {"timestamp": 200, "value": 2.5}]}
        ]"#;
        let store = MemoryStore::from_reader(json.as_bytes()).unwrap();
        assert_eq!(store.series_count(), 1);

        let result = store
            .query_points("metrics", "cpu", "usage", TimeRange::all(), &[], None)
            .unwrap();
        assert_eq!(
            result["web1"],
            vec![DataPoint::from_long(100, 50), DataPoint::from_double(200, 2.5)]
        );
    }
}
