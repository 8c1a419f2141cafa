//! Archival record codec
//!
//! Binary layout, all integers big-endian:
//!
//! ```text
//! ┌──────────┬──────────┬──────────┬───────────┬─────────────┬─────────┐
//! │ db       │ meas.    │ key      │ bucket id │ payload len │ payload │
//! │ u16 + N  │ u16 + N  │ u16 + N  │ i32       │ i32         │ N bytes │
//! └──────────┴──────────┴──────────┴───────────┴─────────────┴─────────┘
//! ```
//!
//! Strings carry a 16-bit byte length followed by UTF-8 bytes. A record
//! that ends early anywhere is rejected, never read short.

use crate::archive::error::{ArchiveError, ArchiveResult};
use serde::Serialize;
use std::io::{ErrorKind, Read, Write};

/// Read buffer growth step for payloads
const PAYLOAD_CHUNK: usize = 64 * 1024;

/// One archived series bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivalRecord {
    /// Database name
    pub db: String,
    /// Measurement name
    pub measurement: String,
    /// Series identity
    pub series_key: String,
    /// Time bucket the payload covers
    pub bucket_id: i32,
    /// Opaque encoded bucket contents
    #[serde(skip)]
    pub payload: Vec<u8>,
}

impl ArchivalRecord {
    pub fn new(
        db: impl Into<String>,
        measurement: impl Into<String>,
        series_key: impl Into<String>,
        bucket_id: i32,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            db: db.into(),
            measurement: measurement.into(),
            series_key: series_key.into(),
            bucket_id,
            payload,
        }
    }

    /// Encoded size in bytes
    pub fn encoded_len(&self) -> usize {
        2 + self.db.len()
            + 2
            + self.measurement.len()
            + 2
            + self.series_key.len()
            + 4
            + 4
            + self.payload.len()
    }

    /// Write the record
    pub fn write_to<W: Write>(&self, writer: &mut W) -> ArchiveResult<()> {
        let payload_len =
            i32::try_from(self.payload.len()).map_err(|_| ArchiveError::InvalidLength {
                field: "payload",
                length: self.payload.len() as i64,
            })?;

        write_string(writer, "db", &self.db)?;
        write_string(writer, "measurement", &self.measurement)?;
        write_string(writer, "series_key", &self.series_key)?;
        writer.write_all(&self.bucket_id.to_be_bytes())?;
        writer.write_all(&payload_len.to_be_bytes())?;
        writer.write_all(&self.payload)?;
        Ok(())
    }

    /// Read one record
    pub fn read_from<R: Read>(reader: &mut R) -> ArchiveResult<Self> {
        Self::try_read_from(reader)?.ok_or(ArchiveError::TruncatedRecord {
            field: "db",
            expected: 2,
            actual: 0,
        })
    }

    /// Read one record, or `None` at a clean end of input
    pub fn try_read_from<R: Read>(reader: &mut R) -> ArchiveResult<Option<Self>> {
        let mut len_buf = [0u8; 2];
        let filled = fill(reader, &mut len_buf)?;
        if filled == 0 {
            return Ok(None);
        }
        if filled < len_buf.len() {
            return Err(ArchiveError::TruncatedRecord {
                field: "db",
                expected: len_buf.len(),
                actual: filled,
            });
        }

        let db = read_string_body(reader, "db", u16::from_be_bytes(len_buf))?;
        let measurement = read_string(reader, "measurement")?;
        let series_key = read_string(reader, "series_key")?;
        let bucket_id = read_i32(reader, "bucket_id")?;

        let payload_len = read_i32(reader, "payload_len")?;
        let payload_len = usize::try_from(payload_len).map_err(|_| ArchiveError::InvalidLength {
            field: "payload",
            length: payload_len as i64,
        })?;
        let payload = read_payload(reader, payload_len)?;

        Ok(Some(Self {
            db,
            measurement,
            series_key,
            bucket_id,
            payload,
        }))
    }

    /// Encode into a new buffer
    pub fn to_bytes(&self) -> ArchiveResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Decode the first record in a buffer
    pub fn from_bytes(bytes: &[u8]) -> ArchiveResult<Self> {
        let mut cursor = bytes;
        Self::read_from(&mut cursor)
    }
}

/// Iterator over the records of a stream
pub struct RecordIterator<R> {
    reader: R,
    failed: bool,
}

impl<R: Read> RecordIterator<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            failed: false,
        }
    }
}

impl<R: Read> Iterator for RecordIterator<R> {
    type Item = ArchiveResult<ArchivalRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match ArchivalRecord::try_read_from(&mut self.reader) {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

fn write_string<W: Write>(writer: &mut W, field: &'static str, value: &str) -> ArchiveResult<()> {
    let len = u16::try_from(value.len()).map_err(|_| ArchiveError::StringTooLong {
        field,
        length: value.len(),
    })?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

fn read_string<R: Read>(reader: &mut R, field: &'static str) -> ArchiveResult<String> {
    let mut len_buf = [0u8; 2];
    read_field(reader, field, &mut len_buf)?;
    read_string_body(reader, field, u16::from_be_bytes(len_buf))
}

fn read_string_body<R: Read>(reader: &mut R, field: &'static str, len: u16) -> ArchiveResult<String> {
    let mut bytes = vec![0u8; len as usize];
    read_field(reader, field, &mut bytes)?;
    String::from_utf8(bytes).map_err(|source| ArchiveError::InvalidUtf8 { field, source })
}

fn read_i32<R: Read>(reader: &mut R, field: &'static str) -> ArchiveResult<i32> {
    let mut buf = [0u8; 4];
    read_field(reader, field, &mut buf)?;
    Ok(i32::from_be_bytes(buf))
}

/// Read a declared-length payload without trusting the length for allocation
fn read_payload<R: Read>(reader: &mut R, len: usize) -> ArchiveResult<Vec<u8>> {
    let mut payload = Vec::with_capacity(len.min(PAYLOAD_CHUNK));
    reader.by_ref().take(len as u64).read_to_end(&mut payload)?;
    if payload.len() < len {
        return Err(ArchiveError::TruncatedRecord {
            field: "payload",
            expected: len,
            actual: payload.len(),
        });
    }
    Ok(payload)
}

fn read_field<R: Read>(reader: &mut R, field: &'static str, buf: &mut [u8]) -> ArchiveResult<()> {
    let actual = fill(reader, buf)?;
    if actual < buf.len() {
        return Err(ArchiveError::TruncatedRecord {
            field,
            expected: buf.len(),
            actual,
        });
    }
    Ok(())
}

/// Read until `buf` is full or input ends; returns the bytes read
fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ArchivalRecord {
        ArchivalRecord::new("metrics", "cpu", "host=web1", 1_700_000, vec![1, 2, 3, 4, 5])
    }

    #[test]
    fn test_layout() {
        let bytes = sample().to_bytes().unwrap();
        assert_eq!(bytes.len(), sample().encoded_len());

        assert_eq!(&bytes[0..2], &[0, 7]);
        assert_eq!(&bytes[2..9], b"metrics");
        assert_eq!(&bytes[9..11], &[0, 3]);
        assert_eq!(&bytes[11..14], b"cpu");
        assert_eq!(&bytes[14..16], &[0, 9]);
        assert_eq!(&bytes[16..25], b"host=web1");
        assert_eq!(&bytes[25..29], &1_700_000i32.to_be_bytes());
        assert_eq!(&bytes[29..33], &[0, 0, 0, 5]);
        assert_eq!(&bytes[33..], &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_decode() {
        let bytes = sample().to_bytes().unwrap();
        assert_eq!(ArchivalRecord::from_bytes(&bytes).unwrap(), sample());
    }

    #[test]
    fn test_non_ascii_strings() {
        let record = ArchivalRecord::new("db", "température", "capteur=é", -3, Vec::new());
        let bytes = record.to_bytes().unwrap();
        assert_eq!(ArchivalRecord::from_bytes(&bytes).unwrap(), record);
    }

    #[test]
    fn test_truncated_payload_is_rejected() {
        let bytes = sample().to_bytes().unwrap();
        let err = ArchivalRecord::from_bytes(&bytes[..bytes.len() - 2]).unwrap_err();
        match err {
            ArchiveError::TruncatedRecord {
                field,
                expected,
                actual,
            } => {
                assert_eq!(field, "payload");
                assert_eq!(expected, 5);
                assert_eq!(actual, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_truncated_anywhere_is_rejected() {
        let bytes = sample().to_bytes().unwrap();
        for cut in 1..bytes.len() {
            let err = ArchivalRecord::from_bytes(&bytes[..cut]).unwrap_err();
            assert!(
                matches!(err, ArchiveError::TruncatedRecord { .. }),
                "cut at {cut}: {err:?}"
            );
        }
    }

    #[test]
    fn test_clean_end_of_input() {
        let mut empty: &[u8] = &[];
        assert!(ArchivalRecord::try_read_from(&mut empty).unwrap().is_none());
        assert!(ArchivalRecord::from_bytes(&[]).is_err());
    }

    #[test]
    fn test_negative_payload_length() {
        let mut bytes = sample().to_bytes().unwrap();
        bytes[29..33].copy_from_slice(&(-1i32).to_be_bytes());
        assert!(matches!(
            ArchivalRecord::from_bytes(&bytes),
            Err(ArchiveError::InvalidLength { length: -1, .. })
        ));
    }

    #[test]
    fn test_huge_declared_length_does_not_allocate() {
        let mut bytes = sample().to_bytes().unwrap();
        bytes[29..33].copy_from_slice(&i32::MAX.to_be_bytes());
        assert!(matches!(
            ArchivalRecord::from_bytes(&bytes),
            Err(ArchiveError::TruncatedRecord { field: "payload", .. })
        ));
    }

    #[test]
    fn test_string_too_long() {
        let record = ArchivalRecord::new("db", "m", "k".repeat(70_000), 0, Vec::new());
        assert!(matches!(
            record.to_bytes(),
            Err(ArchiveError::StringTooLong { field: "series_key", length: 70_000 })
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut bytes = sample().to_bytes().unwrap();
        bytes[2] = 0xff;
        assert!(matches!(
            ArchivalRecord::from_bytes(&bytes),
            Err(ArchiveError::InvalidUtf8 { field: "db", .. })
        ));
    }

    #[test]
    fn test_record_iterator() {
        let mut bytes = sample().to_bytes().unwrap();
        let second = ArchivalRecord::new("metrics", "mem", "host=web2", 2, vec![9]);
        bytes.extend(second.to_bytes().unwrap());

        let records: Vec<ArchivalRecord> = RecordIterator::new(bytes.as_slice())
            .collect::<ArchiveResult<_>>()
            .unwrap();
        assert_eq!(records, vec![sample(), second]);

        bytes.push(0);
        let results: Vec<_> = RecordIterator::new(bytes.as_slice()).collect();
        assert_eq!(results.len(), 3);
        assert!(results[2].is_err());
    }
}
