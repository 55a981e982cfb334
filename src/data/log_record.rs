use bytes::{BufMut, BytesMut};
use prost::{decode_length_delimiter, encode_length_delimiter, length_delimiter_len};

use crate::errors::{Errors, Result};

/// Value of the type byte in each frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogRecordType {
  /// A live key-value pair.
  Normal = 0,

  /// Tombstone marking its key as deleted.
  Deleted = 1,

  /// Sentinel terminating a committed write batch.
  TxnFinished = 2,
}

impl LogRecordType {
  /// Maps the wire byte back to a record type. Any other byte means the
  /// frame is corrupt.
  pub fn from_u8(v: u8) -> Result<Self> {
    match v {
      0 => Ok(LogRecordType::Normal),
      1 => Ok(LogRecordType::Deleted),
      2 => Ok(LogRecordType::TxnFinished),
      _ => Err(Errors::InvalidLogRecordCrc),
    }
  }
}

/// A single entry appended to a data file.
///
/// On disk every record is framed as
///
/// ```text
/// | crc32 (4B LE) | type (1B) | key_size (varint) | value_size (varint) | key | value |
/// ```
///
/// with the crc computed over everything after the crc field itself.
#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
  pub(crate) key: Vec<u8>,
  pub(crate) value: Vec<u8>,
  pub(crate) rec_type: LogRecordType,
}

/// Decoded frame header. The type is kept as the raw wire byte until the
/// crc has been verified.
#[derive(Debug)]
pub struct LogRecordHeader {
  pub(crate) crc: u32,
  pub(crate) rec_type: u8,
  pub(crate) key_size: usize,
  pub(crate) value_size: usize,
}

/// Location of a record on disk, the only thing the index remembers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogRecordPos {
  pub(crate) file_id: u32,
  pub(crate) offset: u64,
}

/// A batch record held back during replay until its commit sentinel is
/// seen.
pub struct TransactionRecord {
  pub(crate) record: LogRecord,
  pub(crate) pos: LogRecordPos,
}

impl LogRecord {
  /// Encodes the record into its on-disk frame. The crc over the rest of
  /// the frame is patched into the leading four bytes.
  pub fn encode(&self) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(self.encoded_length());

    // crc placeholder, filled in once the frame is complete
    buf.put_u32_le(0);
    buf.put_u8(self.rec_type as u8);
    encode_length_delimiter(self.key.len(), &mut buf).unwrap();
    encode_length_delimiter(self.value.len(), &mut buf).unwrap();
    buf.extend_from_slice(&self.key);
    buf.extend_from_slice(&self.value);

    let crc = crc32fast::hash(&buf[4..]);
    buf[..4].copy_from_slice(&crc.to_le_bytes());

    buf.to_vec()
  }

  pub fn encoded_length(&self) -> usize {
    std::mem::size_of::<u32>()
      + std::mem::size_of::<u8>()
      + length_delimiter_len(self.key.len())
      + length_delimiter_len(self.value.len())
      + self.key.len()
      + self.value.len()
  }
}

/// Parses a frame header from the start of `buf`, returning it together
/// with its encoded length. `None` signals a short read: fewer bytes than
/// the fixed part plus both varints.
pub fn decode_log_record_header(buf: &[u8]) -> Option<(LogRecordHeader, usize)> {
  if buf.len() <= 5 {
    return None;
  }

  let crc = u32::from_le_bytes(buf[..4].try_into().unwrap());
  let rec_type = buf[4];

  let mut size_buf = &buf[5..];
  let remaining = size_buf.len();
  let key_size = decode_length_delimiter(&mut size_buf).ok()?;
  let value_size = decode_length_delimiter(&mut size_buf).ok()?;
  let header_size = 5 + (remaining - size_buf.len());

  Some((
    LogRecordHeader {
      crc,
      rec_type,
      key_size,
      value_size,
    },
    header_size,
  ))
}

/// Recomputes the crc of `record` given its header bytes without the
/// leading crc field.
pub fn get_log_record_crc(record: &LogRecord, header: &[u8]) -> u32 {
  let mut hasher = crc32fast::Hasher::new();
  hasher.update(header);
  hasher.update(&record.key);
  hasher.update(&record.value);
  hasher.finalize()
}

/// Largest possible frame header: crc, type and two maximum-width size
/// varints.
pub fn max_log_record_header_size() -> usize {
  std::mem::size_of::<u32>()
    + std::mem::size_of::<u8>()
    + length_delimiter_len(u32::MAX as usize) * 2
}
