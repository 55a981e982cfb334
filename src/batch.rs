use std::sync::{atomic::Ordering, Arc};

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use prost::encoding::{decode_varint, encode_varint};

use crate::{
  data::log_record::{LogRecord, LogRecordType},
  db::Engine,
  errors::{Errors, Result},
  option::WriteBatchOptions,
};

/// Sequence number tagging writes made outside any batch.
pub(crate) const NON_TXN_SEQ_NO: u64 = 0;

/// Buffers mutations and commits them atomically: after a crash either
/// every operation of a committed batch is replayed or none of them is.
pub struct WriteBatch<'a> {
  engine: &'a Engine,
  /// insertion-ordered, one slot per key; a later put or delete of the
  /// same key replaces the slot in place
  pub(crate) pending_writes: Arc<Mutex<Vec<LogRecord>>>,
  pub(crate) options: WriteBatchOptions,
}

impl Engine {
  /// Creates an empty write batch over this engine.
  pub fn new_write_batch(&self, options: WriteBatchOptions) -> WriteBatch {
    WriteBatch {
      engine: self,
      pending_writes: Arc::new(Mutex::new(Vec::new())),
      options,
    }
  }
}

impl WriteBatch<'_> {
  /// Buffers a put. Nothing is visible until `commit`.
  pub fn put(&self, key: Bytes, value: Bytes) -> Result<()> {
    if key.is_empty() {
      return Err(Errors::KeyIsEmpty);
    }

    let record = LogRecord {
      key: key.to_vec(),
      value: value.to_vec(),
      rec_type: LogRecordType::Normal,
    };

    let mut pending = self.pending_writes.lock();
    upsert_pending(&mut pending, record);
    Ok(())
  }

  /// Buffers a delete. A key absent from both the database and this
  /// batch is left untouched and produces no record.
  pub fn delete(&self, key: Bytes) -> Result<()> {
    if key.is_empty() {
      return Err(Errors::KeyIsEmpty);
    }

    let mut pending = self.pending_writes.lock();
    let buffered = pending.iter().any(|rec| rec.key.as_slice() == &key[..]);
    if self.engine.index.get(key.to_vec()).is_none() && !buffered {
      return Ok(());
    }

    let record = LogRecord {
      key: key.to_vec(),
      value: Default::default(),
      rec_type: LogRecordType::Deleted,
    };
    upsert_pending(&mut pending, record);
    Ok(())
  }

  /// Writes every buffered record under a fresh sequence number, appends
  /// the commit sentinel, then applies the whole batch to the index.
  ///
  /// A batch over `max_batch_num` is rejected with its buffer intact so
  /// the caller may retry.
  pub fn commit(&self) -> Result<()> {
    let mut pending = self.pending_writes.lock();
    if pending.is_empty() {
      return Ok(());
    }
    if pending.len() > self.options.max_batch_num {
      return Err(Errors::ExceedMaxBatchNum);
    }

    // one commit at a time; this also orders sequence numbers on disk
    let _guard = self.engine.write_lock.lock();

    let seq_no = self.engine.seq_no.fetch_add(1, Ordering::SeqCst) + 1;

    let mut positions = Vec::with_capacity(pending.len());
    for record in pending.iter() {
      let seq_record = LogRecord {
        key: log_record_key_with_seq(record.key.clone(), seq_no),
        value: record.value.clone(),
        rec_type: record.rec_type,
      };
      positions.push(self.engine.append_log_record(&seq_record)?);
    }

    // the sentinel is what makes the batch durable: a replay that does
    // not find it discards every record written above
    let fin_record = LogRecord {
      key: log_record_key_with_seq(Vec::new(), seq_no),
      value: Default::default(),
      rec_type: LogRecordType::TxnFinished,
    };
    self.engine.append_log_record(&fin_record)?;

    if self.options.sync_writes {
      self.engine.sync()?;
    }

    // the batch becomes visible to readers here, in one pass under the
    // write lock
    for (record, pos) in pending.iter().zip(positions) {
      match record.rec_type {
        LogRecordType::Normal => {
          self.engine.index.put(record.key.clone(), pos);
        }
        LogRecordType::Deleted => {
          // a tombstone for a key the index never held finds nothing,
          // which is fine
          self.engine.index.delete(record.key.clone());
        }
        LogRecordType::TxnFinished => {}
      }
    }

    pending.clear();
    Ok(())
  }
}

fn upsert_pending(pending: &mut Vec<LogRecord>, record: LogRecord) {
  match pending.iter_mut().find(|rec| rec.key == record.key) {
    Some(existing) => *existing = record,
    None => pending.push(record),
  }
}

/// Prefixes `key` with the varint-encoded sequence number.
pub(crate) fn log_record_key_with_seq(key: Vec<u8>, seq_no: u64) -> Vec<u8> {
  let mut enc_key = BytesMut::new();
  encode_varint(seq_no, &mut enc_key);
  enc_key.extend_from_slice(&key);
  enc_key.to_vec()
}

/// Splits a stored key into the caller's key and its sequence number.
pub(crate) fn parse_log_record_key(key: &[u8]) -> (Vec<u8>, u64) {
  let mut buf = key;
  let seq_no = decode_varint(&mut buf).expect("record key misses its sequence number prefix");
  (buf.to_vec(), seq_no)
}
