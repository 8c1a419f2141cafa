//! Query Executor
//!
//! Executes compiled targets against a [`SeriesStore`]:
//! 1. Fetch matching series for the target's filter and time range
//! 2. Order each series by timestamp and build fresh stage instances for it
//! 3. Run the streaming or materialized pipeline
//! 4. Assemble sorted output
//!
//! # Execution Pipeline
//!
//! ```text
//! TargetSeries → query_points → per series: Pipeline::build → run → assemble
//! ```

use crate::query::ast::TargetSeries;
use crate::query::error::{QueryError, QueryResult};
use crate::query::parser::compile_query;
use crate::query::result::{assemble, sort_by_target, OutputSeries};
use crate::stage::{ExecutionMode, Pipeline};
use crate::storage::{DataPoint, SeriesStore, StorageError, TimeRange};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Result of executing one or more targets
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutput {
    /// Output series sorted by target
    pub series: Vec<OutputSeries>,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
    /// Number of points read from the store
    pub points_scanned: usize,
}

impl QueryOutput {
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Query executor
pub struct QueryExecutor<S> {
    /// Series source
    store: Arc<S>,
    /// Run every chain through the materialized pipeline
    force_materialized: bool,
}

impl<S: SeriesStore> QueryExecutor<S> {
    /// Create a new query executor
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            force_materialized: false,
        }
    }

    /// Always use the materialized pipeline
    pub fn force_materialized(mut self, force: bool) -> Self {
        self.force_materialized = force;
        self
    }

    /// Compile and execute a query string
    pub fn execute_str(&self, db: &str, query: &str, range: TimeRange) -> QueryResult<QueryOutput> {
        let target = compile_query(query)?;
        self.execute(db, &target, range)
    }

    /// Execute a compiled target
    pub fn execute(
        &self,
        db: &str,
        target: &TargetSeries,
        range: TimeRange,
    ) -> QueryResult<QueryOutput> {
        let start = Instant::now();

        let mut fetched = self.fetch(db, target, range)?;
        for points in fetched.values_mut() {
            points.sort_by_key(|p| p.timestamp);
        }
        let points_scanned = fetched.values().map(Vec::len).sum();
        let processed = self.run_stages(target, fetched)?;
        let series = assemble(processed);

        let execution_time_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            db,
            selector = %target.selector(),
            series = series.len(),
            points_scanned,
            execution_time_ms,
            "Executed target"
        );

        Ok(QueryOutput {
            series,
            execution_time_ms,
            points_scanned,
        })
    }

    /// Execute several targets, merging their series
    pub fn execute_all(
        &self,
        db: &str,
        targets: &[TargetSeries],
        range: TimeRange,
    ) -> QueryResult<QueryOutput> {
        let start = Instant::now();
        let mut series = Vec::new();
        let mut points_scanned = 0;

        for target in targets {
            let output = self.execute(db, target, range)?;
            points_scanned += output.points_scanned;
            series.extend(output.series);
        }
        sort_by_target(&mut series);

        Ok(QueryOutput {
            series,
            execution_time_ms: start.elapsed().as_millis() as u64,
            points_scanned,
        })
    }

    fn fetch(
        &self,
        db: &str,
        target: &TargetSeries,
        range: TimeRange,
    ) -> QueryResult<BTreeMap<String, Vec<DataPoint>>> {
        self.store
            .query_points(
                db,
                &target.measurement,
                &target.field,
                range,
                &target.filter_elements,
                target.filter.as_ref(),
            )
            .map_err(|e| match e {
                e if e.is_not_found() => QueryError::SeriesNotFound(not_found_label(db, target, &e)),
                e => QueryError::Storage(e),
            })
    }

    fn run_stages(
        &self,
        target: &TargetSeries,
        fetched: BTreeMap<String, Vec<DataPoint>>,
    ) -> QueryResult<BTreeMap<String, Vec<DataPoint>>> {
        let Some(chain) = target.stages.as_ref() else {
            return Ok(fetched);
        };

        let mode = if self.force_materialized {
            ExecutionMode::Materialized
        } else {
            chain.mode
        };

        fetched
            .into_iter()
            .map(|(key, points)| {
                let pipeline = Pipeline::build(chain, mode)?;
                Ok((key, pipeline.run(points)))
            })
            .collect()
    }
}

fn not_found_label(db: &str, target: &TargetSeries, error: &StorageError) -> String {
    format!("{}:{} ({})", db, target.selector(), error)
}
