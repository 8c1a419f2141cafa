//! Storage collaborator contract
//!
//! The query layer never reads pages or buckets itself. It asks a
//! [`SeriesStore`] for the points of every series that matches a compiled
//! filter and receives them keyed by series identity:
//!
//! - **types**: `DataPoint`, `SeriesValue`, `TimeRange`, `Series`
//! - **memory**: `MemoryStore`, an in-process store for tests and the CLI
//! - **error**: Error types
//!
//! # Read Path
//!
//! ```text
//! TargetSeries → SeriesStore::query_points → {series identity → [DataPoint]} → Pipeline
//! ```

pub mod error;
pub mod memory;
pub mod types;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use types::{tag_list, DataPoint, Series, SeriesValue, TimeRange};

use crate::filter::SeriesFilter;
use std::collections::BTreeMap;

/// Source of series points for query execution
///
/// Implementations return a not-found error (see
/// [`StorageError::is_not_found`]) when the database, measurement or field
/// does not exist, and an empty map when nothing matches the filter.
pub trait SeriesStore {
    /// Fetch the points of every matching series within `range`
    ///
    /// When `filter` is `None`, a series is selected if its `key=value` tag
    /// strings contain every entry of `tag_list`.
    fn query_points(
        &self,
        db: &str,
        measurement: &str,
        field: &str,
        range: TimeRange,
        tag_list: &[String],
        filter: Option<&SeriesFilter>,
    ) -> StorageResult<BTreeMap<String, Vec<DataPoint>>>;
}
