use std::sync::Arc;

use bytes::Bytes;
use crossbeam_skiplist::SkipMap;

use crate::{data::log_record::LogRecordPos, errors::Result, option::IteratorOptions};

use super::{IndexIterator, Indexer};

/// Lock-free ordered index over a concurrent skip list.
pub struct SkipList {
  skl: Arc<SkipMap<Vec<u8>, LogRecordPos>>,
}

impl SkipList {
  pub fn new() -> Self {
    Self {
      skl: Arc::new(SkipMap::new()),
    }
  }
}

impl Default for SkipList {
  fn default() -> Self {
    Self::new()
  }
}

impl Indexer for SkipList {
  fn put(&self, key: Vec<u8>, pos: LogRecordPos) -> Option<LogRecordPos> {
    let prev = self.skl.get(&key).map(|entry| *entry.value());
    self.skl.insert(key, pos);
    prev
  }

  fn get(&self, key: Vec<u8>) -> Option<LogRecordPos> {
    self.skl.get(&key).map(|entry| *entry.value())
  }

  fn delete(&self, key: Vec<u8>) -> Option<LogRecordPos> {
    self.skl.remove(&key).map(|entry| *entry.value())
  }

  fn list_keys(&self) -> Result<Vec<Bytes>> {
    let mut keys = Vec::with_capacity(self.skl.len());
    for entry in self.skl.iter() {
      keys.push(Bytes::copy_from_slice(entry.key()));
    }
    Ok(keys)
  }

  fn iterator(&self, options: IteratorOptions) -> Box<dyn IndexIterator> {
    let mut items = Vec::with_capacity(self.skl.len());
    for entry in self.skl.iter() {
      items.push((entry.key().clone(), *entry.value()));
    }
    if options.reverse {
      items.reverse();
    }

    Box::new(SkipListIterator {
      items,
      curr_index: 0,
      options,
    })
  }
}

/// Walks a sorted snapshot of the skip list captured at creation time.
pub struct SkipListIterator {
  /// key-position pairs in traversal order
  items: Vec<(Vec<u8>, LogRecordPos)>,
  curr_index: usize,
  options: IteratorOptions,
}

impl IndexIterator for SkipListIterator {
  fn rewind(&mut self) {
    self.curr_index = 0;
  }

  fn seek(&mut self, key: Vec<u8>) {
    self.curr_index = match self.items.binary_search_by(|(k, _)| {
      if self.options.reverse {
        k.cmp(&key).reverse()
      } else {
        k.cmp(&key)
      }
    }) {
      Ok(idx) => idx,
      Err(idx) => idx,
    };
  }

  fn next(&mut self) -> Option<(&Vec<u8>, &LogRecordPos)> {
    if self.curr_index >= self.items.len() {
      return None;
    }

    while let Some(item) = self.items.get(self.curr_index) {
      self.curr_index += 1;
      let prefix = &self.options.prefix;
      if prefix.is_empty() || item.0.starts_with(prefix) {
        return Some((&item.0, &item.1));
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn pos(file_id: u32, offset: u64) -> LogRecordPos {
    LogRecordPos { file_id, offset }
  }

  #[test]
  fn test_skiplist_put_get() {
    let skl = SkipList::new();

    assert!(skl.put(b"abc".to_vec(), pos(1, 10)).is_none());
    assert_eq!(Some(pos(1, 10)), skl.get(b"abc".to_vec()));

    let prev = skl.put(b"abc".to_vec(), pos(2, 20));
    assert_eq!(Some(pos(1, 10)), prev);
    assert_eq!(Some(pos(2, 20)), skl.get(b"abc".to_vec()));

    assert!(skl.get(b"missing".to_vec()).is_none());
  }

  #[test]
  fn test_skiplist_delete() {
    let skl = SkipList::new();

    skl.put(b"abc".to_vec(), pos(1, 10));
    assert_eq!(Some(pos(1, 10)), skl.delete(b"abc".to_vec()));
    assert!(skl.get(b"abc".to_vec()).is_none());
    assert!(skl.delete(b"abc".to_vec()).is_none());
  }

  #[test]
  fn test_skiplist_list_keys() {
    let skl = SkipList::new();

    skl.put(b"ccde".to_vec(), pos(1, 10));
    skl.put(b"aacd".to_vec(), pos(1, 20));
    skl.put(b"bbae".to_vec(), pos(1, 30));

    let keys = skl.list_keys().unwrap();
    assert_eq!(
      vec![
        Bytes::from("aacd"),
        Bytes::from("bbae"),
        Bytes::from("ccde")
      ],
      keys
    );
  }

  #[test]
  fn test_skiplist_iterator() {
    let skl = SkipList::new();
    skl.put(b"a/1".to_vec(), pos(1, 10));
    skl.put(b"a/2".to_vec(), pos(1, 20));
    skl.put(b"b/1".to_vec(), pos(1, 30));

    let mut iter = skl.iterator(IteratorOptions {
      prefix: b"a/".to_vec(),
      reverse: false,
    });
    assert_eq!(b"a/1".to_vec(), *iter.next().unwrap().0);
    assert_eq!(b"a/2".to_vec(), *iter.next().unwrap().0);
    assert!(iter.next().is_none());

    let mut rev_iter = skl.iterator(IteratorOptions {
      prefix: Vec::new(),
      reverse: true,
    });
    assert_eq!(b"b/1".to_vec(), *rev_iter.next().unwrap().0);

    rev_iter.seek(b"a/2".to_vec());
    assert_eq!(b"a/2".to_vec(), *rev_iter.next().unwrap().0);
  }
}
