use std::{collections::BTreeMap, sync::Arc};

use bytes::Bytes;
use parking_lot::RwLock;

use crate::{data::log_record::LogRecordPos, errors::Result, option::IteratorOptions};

use super::{IndexIterator, Indexer};

/// Default index: a standard ordered map behind a rw-lock.
pub struct BTree {
  tree: Arc<RwLock<BTreeMap<Vec<u8>, LogRecordPos>>>,
}

impl BTree {
  pub fn new() -> Self {
    Self {
      tree: Arc::new(RwLock::new(BTreeMap::new())),
    }
  }
}

impl Default for BTree {
  fn default() -> Self {
    Self::new()
  }
}

impl Indexer for BTree {
  fn put(&self, key: Vec<u8>, pos: LogRecordPos) -> Option<LogRecordPos> {
    self.tree.write().insert(key, pos)
  }

  fn get(&self, key: Vec<u8>) -> Option<LogRecordPos> {
    self.tree.read().get(&key).copied()
  }

  fn delete(&self, key: Vec<u8>) -> Option<LogRecordPos> {
    self.tree.write().remove(&key)
  }

  fn list_keys(&self) -> Result<Vec<Bytes>> {
    let read_guard = self.tree.read();
    let mut keys = Vec::with_capacity(read_guard.len());
    for key in read_guard.keys() {
      keys.push(Bytes::copy_from_slice(key));
    }
    Ok(keys)
  }

  fn iterator(&self, options: IteratorOptions) -> Box<dyn IndexIterator> {
    let read_guard = self.tree.read();
    let mut items = Vec::with_capacity(read_guard.len());
    for (key, pos) in read_guard.iter() {
      items.push((key.clone(), *pos));
    }
    if options.reverse {
      items.reverse();
    }

    Box::new(BTreeIterator {
      items,
      curr_index: 0,
      options,
    })
  }
}

/// Walks a sorted snapshot of the tree captured at creation time.
pub struct BTreeIterator {
  /// key-position pairs in traversal order
  items: Vec<(Vec<u8>, LogRecordPos)>,
  curr_index: usize,
  options: IteratorOptions,
}

impl IndexIterator for BTreeIterator {
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
  fn test_btree_put_get() {
    let bt = BTree::new();

    assert!(bt.put(b"abc".to_vec(), pos(1, 10)).is_none());
    assert_eq!(Some(pos(1, 10)), bt.get(b"abc".to_vec()));

    // overwriting returns the replaced position
    let prev = bt.put(b"abc".to_vec(), pos(2, 20));
    assert_eq!(Some(pos(1, 10)), prev);
    assert_eq!(Some(pos(2, 20)), bt.get(b"abc".to_vec()));

    assert!(bt.get(b"missing".to_vec()).is_none());
  }

  #[test]
  fn test_btree_delete() {
    let bt = BTree::new();

    bt.put(b"abc".to_vec(), pos(1, 10));
    assert_eq!(Some(pos(1, 10)), bt.delete(b"abc".to_vec()));
    assert!(bt.get(b"abc".to_vec()).is_none());

    // deleting an absent key reports nothing removed
    assert!(bt.delete(b"abc".to_vec()).is_none());
  }

  #[test]
  fn test_btree_list_keys() {
    let bt = BTree::new();
    assert!(bt.list_keys().unwrap().is_empty());

    bt.put(b"ccde".to_vec(), pos(1, 10));
    bt.put(b"aacd".to_vec(), pos(1, 20));
    bt.put(b"bbae".to_vec(), pos(1, 30));

    let keys = bt.list_keys().unwrap();
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
  fn test_btree_iterator_forward_and_reverse() {
    let bt = BTree::new();
    bt.put(b"b".to_vec(), pos(1, 10));
    bt.put(b"a".to_vec(), pos(1, 20));
    bt.put(b"c".to_vec(), pos(1, 30));

    let mut iter = bt.iterator(IteratorOptions::default());
    let mut seen = Vec::new();
    while let Some((key, _)) = iter.next() {
      seen.push(key.clone());
    }
    assert_eq!(vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()], seen);

    let mut rev_iter = bt.iterator(IteratorOptions {
      reverse: true,
      ..Default::default()
    });
    let mut rev_seen = Vec::new();
    while let Some((key, _)) = rev_iter.next() {
      rev_seen.push(key.clone());
    }
    assert_eq!(vec![b"c".to_vec(), b"b".to_vec(), b"a".to_vec()], rev_seen);
  }

  #[test]
  fn test_btree_iterator_seek() {
    let bt = BTree::new();
    bt.put(b"ccde".to_vec(), pos(1, 10));
    bt.put(b"aacd".to_vec(), pos(1, 20));
    bt.put(b"bbae".to_vec(), pos(1, 30));

    let mut iter = bt.iterator(IteratorOptions::default());
    iter.seek(b"b".to_vec());
    assert_eq!(b"bbae".to_vec(), *iter.next().unwrap().0);

    // seeking past the last key exhausts the iterator
    iter.seek(b"zz".to_vec());
    assert!(iter.next().is_none());

    let mut rev_iter = bt.iterator(IteratorOptions {
      reverse: true,
      ..Default::default()
    });
    rev_iter.seek(b"b".to_vec());
    assert_eq!(b"aacd".to_vec(), *rev_iter.next().unwrap().0);
  }

  #[test]
  fn test_btree_iterator_prefix() {
    let bt = BTree::new();
    bt.put(b"a/1".to_vec(), pos(1, 10));
    bt.put(b"a/2".to_vec(), pos(1, 20));
    bt.put(b"b/1".to_vec(), pos(1, 30));

    let mut iter = bt.iterator(IteratorOptions {
      prefix: b"a/".to_vec(),
      reverse: false,
    });
    assert_eq!(b"a/1".to_vec(), *iter.next().unwrap().0);
    assert_eq!(b"a/2".to_vec(), *iter.next().unwrap().0);
    assert!(iter.next().is_none());

    iter.rewind();
    assert_eq!(b"a/1".to_vec(), *iter.next().unwrap().0);
  }
}
