//! Archival boundary
//!
//! Cold series buckets leave the engine as [`ArchivalRecord`]s in a fixed
//! big-endian layout shared with external archival tooling:
//!
//! - **record**: the record type and its codec
//! - **file**: an archiver appending records to a local file
//! - **error**: Error types

mod error;
mod file;
mod record;

pub use error::{ArchiveError, ArchiveResult};
pub use file::FileArchiver;
pub use record::{ArchivalRecord, RecordIterator};

/// Destination for archived buckets
pub trait Archiver {
    /// Persist one record
    fn archive(&mut self, record: &ArchivalRecord) -> ArchiveResult<()>;

    /// Read back every persisted record, in archive order
    fn unarchive(&mut self) -> ArchiveResult<Vec<ArchivalRecord>>;
}
