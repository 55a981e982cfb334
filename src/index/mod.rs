pub mod btree;
pub mod skiplist;

use bytes::Bytes;

use crate::{
  data::log_record::LogRecordPos,
  errors::Result,
  option::{IndexType, IteratorOptions},
};

/// Ordered key to position map shared by readers and the writer. Keys
/// compare lexicographically as raw bytes.
pub trait Indexer: Sync + Send {
  /// Stores a key's position, returning the one it replaces.
  fn put(&self, key: Vec<u8>, pos: LogRecordPos) -> Option<LogRecordPos>;

  /// Retrieves a key's position from the index.
  fn get(&self, key: Vec<u8>) -> Option<LogRecordPos>;

  /// Deletes a key's position from the index, returning it if the key
  /// was present.
  fn delete(&self, key: Vec<u8>) -> Option<LogRecordPos>;

  fn list_keys(&self) -> Result<Vec<Bytes>>;

  /// Creates an iterator over a snapshot of the key set taken now.
  fn iterator(&self, options: IteratorOptions) -> Box<dyn IndexIterator>;
}

/// Creates a new indexer of the configured kind.
pub fn new_indexer(index_type: &IndexType) -> Box<dyn Indexer> {
  match *index_type {
    IndexType::BTree => Box::new(btree::BTree::new()),
    IndexType::SkipList => Box::new(skiplist::SkipList::new()),
  }
}

/// Cursor over the key positions captured by `Indexer::iterator`. The
/// prefix filter from the options is applied inside `next`.
pub trait IndexIterator: Sync + Send {
  fn rewind(&mut self);

  fn seek(&mut self, key: Vec<u8>);

  fn next(&mut self) -> Option<(&Vec<u8>, &LogRecordPos)>;
}
