//! File-backed archiver
//!
//! Appends encoded records to a single file and reads them all back.

use crate::archive::error::ArchiveResult;
use crate::archive::record::{ArchivalRecord, RecordIterator};
use crate::archive::Archiver;
use crate::config::ArchiveConfig;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Archiver writing to `<dir>/<file_name>`
#[derive(Debug, Clone)]
pub struct FileArchiver {
    path: PathBuf,
}

impl FileArchiver {
    /// Archive into `path`, creating parent directories as needed
    pub fn open(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    /// Archive into the configured directory and file
    pub fn from_config(config: &ArchiveConfig) -> ArchiveResult<Self> {
        Self::open(config.dir.join(&config.file_name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record in an archive file
    pub fn read_all(path: impl AsRef<Path>) -> ArchiveResult<Vec<ArchivalRecord>> {
        let file = File::open(path.as_ref())?;
        RecordIterator::new(BufReader::new(file)).collect()
    }
}

impl Archiver for FileArchiver {
    fn archive(&mut self, record: &ArchivalRecord) -> ArchiveResult<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);
        record.write_to(&mut writer)?;
        writer.flush()?;

        tracing::debug!(
            path = %self.path.display(),
            db = %record.db,
            series = %record.series_key,
            bucket = record.bucket_id,
            bytes = record.encoded_len(),
            "Archived record"
        );
        Ok(())
    }

    fn unarchive(&mut self) -> ArchiveResult<Vec<ArchivalRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        Self::read_all(&self.path)
    }
}
