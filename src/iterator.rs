use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::{
  data::log_record::LogRecordPos,
  db::Engine,
  errors::{Errors, Result},
  index::IndexIterator,
  option::IteratorOptions,
};

/// Cursor over the engine's keys in byte order.
///
/// The key set is captured when the iterator is created; values are read
/// from disk on each `value` call. Captured positions are immutable, so
/// reads never block the writer, and a `value` call whose record turned
/// into a tombstone or whose file is gone reports `KeyNotFound`.
pub struct Iterator<'a> {
  index_iter: Arc<RwLock<Box<dyn IndexIterator>>>,
  engine: &'a Engine,
  curr: Arc<RwLock<Option<(Vec<u8>, LogRecordPos)>>>,
}

impl Engine {
  /// Creates an iterator positioned at the first key that satisfies the
  /// options.
  pub fn iter(&self, options: IteratorOptions) -> Iterator {
    let iter = Iterator {
      index_iter: Arc::new(RwLock::new(self.index.iterator(options))),
      engine: self,
      curr: Arc::new(RwLock::new(None)),
    };
    iter.rewind();
    iter
  }

  /// Returns every live key in ascending byte order.
  pub fn list_keys(&self) -> Result<Vec<Bytes>> {
    self.index.list_keys()
  }

  /// Calls `f` on every live pair in ascending key order until it
  /// returns false.
  pub fn fold<F>(&self, mut f: F) -> Result<()>
  where
    Self: Sized,
    F: FnMut(Bytes, Bytes) -> bool,
  {
    let iter = self.iter(IteratorOptions::default());
    while let Some(key) = iter.key() {
      let value = iter.value()?;
      if !f(key, value) {
        break;
      }
      iter.next();
    }
    Ok(())
  }
}

impl Iterator<'_> {
  /// Repositions at the first qualifying key in traversal order.
  pub fn rewind(&self) {
    let mut index_iter = self.index_iter.write();
    index_iter.rewind();
    *self.curr.write() = index_iter.next().map(|(k, p)| (k.clone(), *p));
  }

  /// Positions at the first qualifying key at or past `key` in traversal
  /// order. Seeking outside the prefix range leaves the cursor invalid.
  pub fn seek(&self, key: Vec<u8>) {
    let mut index_iter = self.index_iter.write();
    index_iter.seek(key);
    *self.curr.write() = index_iter.next().map(|(k, p)| (k.clone(), *p));
  }

  /// Advances one step.
  pub fn next(&self) {
    let mut index_iter = self.index_iter.write();
    *self.curr.write() = index_iter.next().map(|(k, p)| (k.clone(), *p));
  }

  /// Whether the cursor currently points at a key.
  pub fn valid(&self) -> bool {
    self.curr.read().is_some()
  }

  /// The current key, or `None` once the iterator is exhausted.
  pub fn key(&self) -> Option<Bytes> {
    self
      .curr
      .read()
      .as_ref()
      .map(|(key, _)| Bytes::copy_from_slice(key))
  }

  /// Reads the current value from disk.
  pub fn value(&self) -> Result<Bytes> {
    let curr = self.curr.read();
    match curr.as_ref() {
      Some((_, pos)) => self.engine.get_value_by_position(pos),
      None => Err(Errors::KeyNotFound),
    }
  }

  /// Invalidates the cursor.
  pub fn close(&self) {
    *self.curr.write() = None;
  }
}
