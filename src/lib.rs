//! # Chronicle Query
//!
//! Query compilation and execution for time-series storage. Compact query
//! strings select series by tag filter and run their points through a
//! chain of transform and aggregation stages.
//!
//! ## Modules
//!
//! - [`filter`]: Tag predicate trees, filter expression and structured builders
//! - [`stage`]: Stage registry with streaming and materialized pipelines
//! - [`query`]: Query compiler, executor and result assembly
//! - [`storage`]: Series store contract and in-memory store
//! - [`archive`]: Archival record codec and file archiver
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chronicle_query::query::{compile_query, QueryExecutor};
//! use chronicle_query::storage::{DataPoint, MemoryStore, Series, TimeRange};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut store = MemoryStore::new();
//!     store.insert_series(
//!         "metrics",
//!         "cpu",
//!         "usage",
//!         Series::new("web1")
//!             .tag("host", "web1")
//!             .point(DataPoint::from_long(100, 50)),
//!     );
//!
//!     // Select host=web1 and add 10 to every value
//!     let target = compile_query("cpu.usage.host=web1=>add,10")?;
//!
//!     let executor = QueryExecutor::new(Arc::new(store));
//!     let output = executor.execute("metrics", &target, TimeRange::all())?;
//!
//!     println!("{}", serde_json::to_string(&output.series)?);
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod config;
pub mod filter;
pub mod query;
pub mod stage;
pub mod storage;

// Re-export top-level types for convenience
pub use storage::{
    DataPoint, MemoryStore, Series, SeriesStore, SeriesValue, StorageError, StorageResult,
    TimeRange,
};

pub use filter::{
    build_structured_filter, parse_filter_expression, Predicate, SeriesFilter, StringPredicate,
    TagComparison, TagOp, TagPredicate,
};

pub use stage::{
    AggregationFunc, ExecutionMode, MaterializedPipeline, Pipeline, StageArg, StageChain,
    StageKind, StageTemplate, StreamingPipeline,
};

pub use query::{
    compile_query, OutputSeries, QueryError, QueryExecutor, QueryOutput, QueryResult,
    TargetSeries,
};

pub use archive::{ArchivalRecord, ArchiveError, Archiver, FileArchiver};

pub use config::{ArchiveConfig, Config, ConfigError, ConfigOrigin, LoggingConfig, QueryConfig};
