use lazy_static::lazy_static;
use std::path::PathBuf;

lazy_static! {
  pub static ref DEFAULT_DIR_PATH: PathBuf = std::env::temp_dir().join("ember-kv");
}

#[derive(Debug, Clone)]
pub struct Options {
  /// Directory holding the data files.
  pub dir_path: PathBuf,

  /// Maximum size of a single data file in bytes.
  pub data_file_size: u64,

  /// Fsync after every single write.
  pub sync_writes: bool,

  /// Fsync once this many bytes have accumulated since the last sync.
  /// Zero disables the threshold.
  pub bytes_per_sync: usize,

  pub index_type: IndexType,

  /// Replay data files through memory maps when opening.
  pub mmap_at_startup: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexType {
  BTree,

  SkipList,
}

impl Default for Options {
  fn default() -> Self {
    Self {
      dir_path: DEFAULT_DIR_PATH.clone(),
      data_file_size: 256 * 1024 * 1024, // 256MB
      sync_writes: false,
      bytes_per_sync: 0,
      index_type: IndexType::BTree,
      mmap_at_startup: true,
    }
  }
}

pub struct IteratorOptions {
  /// Only keys starting with this byte prefix are visited; empty
  /// matches everything.
  pub prefix: Vec<u8>,
  pub reverse: bool,
}

#[allow(clippy::derivable_impls)]
impl Default for IteratorOptions {
  fn default() -> Self {
    Self {
      prefix: Default::default(),
      reverse: false,
    }
  }
}

pub struct WriteBatchOptions {
  /// Largest number of buffered operations a single commit accepts.
  pub max_batch_num: usize,

  /// Fsync the active file as part of the commit.
  pub sync_writes: bool,
}

impl Default for WriteBatchOptions {
  fn default() -> Self {
    Self {
      max_batch_num: 1000,
      sync_writes: true,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IOManagerType {
  StandardFileIO,

  MemoryMap,
}
