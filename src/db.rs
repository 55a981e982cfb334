use std::{
  collections::HashMap,
  fs,
  path::Path,
  sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc,
  },
};

use bytes::Bytes;
use log::error;
use parking_lot::{Mutex, RwLock};

use crate::{
  batch::{log_record_key_with_seq, parse_log_record_key, NON_TXN_SEQ_NO},
  data::{
    data_file::{DataFile, DATA_FILE_NAME_SUFFIX},
    log_record::{LogRecord, LogRecordPos, LogRecordType, TransactionRecord},
  },
  errors::{Errors, Result},
  index::{new_indexer, Indexer},
  option::{IOManagerType, Options},
  util,
};

/// Storage engine instance owning the data files and the in-memory
/// index. All public operations are safe to call from multiple threads.
pub struct Engine {
  pub(crate) options: Arc<Options>,
  /// the single file currently receiving appends
  pub(crate) active_data_file: Arc<RwLock<DataFile>>,
  /// read-only files keyed by id
  pub(crate) old_data_files: Arc<RwLock<HashMap<u32, DataFile>>>,
  pub(crate) index: Box<dyn Indexer>,
  /// ids discovered at open, ascending; used only while replaying
  file_ids: Vec<u32>,
  /// serializes appends and batch commits together with their index
  /// updates
  pub(crate) write_lock: Mutex<()>,
  /// sequence number of the most recent committed batch
  pub(crate) seq_no: Arc<AtomicU64>,
  /// bytes appended since the last sync, for `bytes_per_sync`
  bytes_write: Arc<AtomicUsize>,
}

/// Point-in-time statistics over an engine instance.
#[derive(Debug)]
pub struct Stat {
  /// number of live keys
  pub key_num: usize,
  /// number of data files, the active one included
  pub data_file_num: usize,
  /// bytes occupied by the database directory
  pub disk_size: u64,
}

impl Engine {
  /// Opens an engine over the directory in `opts`, replaying every data
  /// file in ascending id order to rebuild the index and recover the
  /// batch sequence counter.
  pub fn open(opts: Options) -> Result<Self> {
    check_options(&opts)?;

    let dir_path = opts.dir_path.clone();
    if !dir_path.is_dir() {
      if let Err(e) = fs::create_dir_all(&dir_path) {
        error!("failed to create database directory error: {}", e);
        return Err(Errors::FailedToCreateDatabaseDir);
      }
    }

    let io_type = if opts.mmap_at_startup {
      IOManagerType::MemoryMap
    } else {
      IOManagerType::StandardFileIO
    };

    let mut data_files = load_data_files(&dir_path, io_type)?;
    let file_ids: Vec<u32> = data_files.iter().map(|f| f.get_file_id()).collect();

    // the max-id file keeps receiving appends, the rest become read-only
    let mut older_files = HashMap::new();
    let active_file = match data_files.pop() {
      Some(file) => {
        for data_file in data_files {
          older_files.insert(data_file.get_file_id(), data_file);
        }
        file
      }
      None => DataFile::new(&dir_path, 0, IOManagerType::StandardFileIO)?,
    };

    let engine = Engine {
      index: new_indexer(&opts.index_type),
      options: Arc::new(opts),
      active_data_file: Arc::new(RwLock::new(active_file)),
      old_data_files: Arc::new(RwLock::new(older_files)),
      file_ids,
      write_lock: Mutex::new(()),
      seq_no: Arc::new(AtomicU64::new(NON_TXN_SEQ_NO)),
      bytes_write: Arc::new(AtomicUsize::new(0)),
    };

    let max_seq_no = engine.load_index_from_data_files()?;
    if max_seq_no > NON_TXN_SEQ_NO {
      engine.seq_no.store(max_seq_no, Ordering::SeqCst);
    }

    if engine.options.mmap_at_startup {
      engine.reset_io_type()?;
    }

    Ok(engine)
  }

  /// Stores `value` under `key`. The key must be non-empty.
  pub fn put(&self, key: Bytes, value: Bytes) -> Result<()> {
    if key.is_empty() {
      return Err(Errors::KeyIsEmpty);
    }

    let record = LogRecord {
      key: log_record_key_with_seq(key.to_vec(), NON_TXN_SEQ_NO),
      value: value.to_vec(),
      rec_type: LogRecordType::Normal,
    };

    // the lock pairs the append with its index update, so no reader can
    // observe a position pointing at unwritten bytes
    let _guard = self.write_lock.lock();
    let pos = self.append_log_record(&record)?;
    self.index.put(key.to_vec(), pos);

    Ok(())
  }

  /// Returns the value stored under `key`.
  pub fn get(&self, key: Bytes) -> Result<Bytes> {
    if key.is_empty() {
      return Err(Errors::KeyIsEmpty);
    }

    let pos = match self.index.get(key.to_vec()) {
      Some(pos) => pos,
      None => return Err(Errors::KeyNotFound),
    };

    self.get_value_by_position(&pos)
  }

  /// Reads the record a position points at and returns its value.
  pub(crate) fn get_value_by_position(&self, pos: &LogRecordPos) -> Result<Bytes> {
    let active_file = self.active_data_file.read();
    let older_files = self.old_data_files.read();

    let read_res = if active_file.get_file_id() == pos.file_id {
      active_file.read_log_record(pos.offset)?
    } else {
      match older_files.get(&pos.file_id) {
        Some(data_file) => data_file.read_log_record(pos.offset)?,
        None => return Err(Errors::DataFileNotFound),
      }
    };

    if read_res.record.rec_type == LogRecordType::Deleted {
      return Err(Errors::KeyNotFound);
    }

    Ok(read_res.record.value.into())
  }

  /// Removes `key`. Deleting an absent key is not an error and writes
  /// nothing.
  pub fn delete(&self, key: Bytes) -> Result<()> {
    if key.is_empty() {
      return Err(Errors::KeyIsEmpty);
    }

    let _guard = self.write_lock.lock();
    if self.index.get(key.to_vec()).is_none() {
      return Ok(());
    }

    let record = LogRecord {
      key: log_record_key_with_seq(key.to_vec(), NON_TXN_SEQ_NO),
      value: Default::default(),
      rec_type: LogRecordType::Deleted,
    };
    self.append_log_record(&record)?;

    // the key was just observed in the index, so removal must find it
    if self.index.delete(key.to_vec()).is_none() {
      return Err(Errors::IndexUpdateFailed);
    }

    Ok(())
  }

  /// Appends a record to the active file, rotating to a fresh file when
  /// the frame would push it past `data_file_size`. Callers must hold
  /// the write lock.
  pub(crate) fn append_log_record(&self, record: &LogRecord) -> Result<LogRecordPos> {
    let enc_record = record.encode();
    let record_len = enc_record.len() as u64;

    let mut active_file = self.active_data_file.write();
    if active_file.get_write_off() + record_len > self.options.data_file_size {
      // persist the full file before demoting it to the read-only set
      active_file.sync()?;

      let current_fid = active_file.get_file_id();
      let new_file = DataFile::new(
        &self.options.dir_path,
        current_fid + 1,
        IOManagerType::StandardFileIO,
      )?;
      let old_file = std::mem::replace(&mut *active_file, new_file);
      self.old_data_files.write().insert(current_fid, old_file);
    }

    let write_off = active_file.get_write_off();
    active_file.write(&enc_record)?;

    let written_before = self.bytes_write.fetch_add(enc_record.len(), Ordering::SeqCst);

    let mut need_sync = self.options.sync_writes;
    if !need_sync
      && self.options.bytes_per_sync > 0
      && written_before + enc_record.len() >= self.options.bytes_per_sync
    {
      need_sync = true;
    }
    if need_sync {
      active_file.sync()?;
      self.bytes_write.store(0, Ordering::SeqCst);
    }

    Ok(LogRecordPos {
      file_id: active_file.get_file_id(),
      offset: write_off,
    })
  }

  /// Replays every data file, rebuilding the index. Returns the largest
  /// sequence number observed anywhere on disk so committed sequences
  /// are never reused.
  fn load_index_from_data_files(&self) -> Result<u64> {
    let mut max_seq_no = NON_TXN_SEQ_NO;
    if self.file_ids.is_empty() {
      return Ok(max_seq_no);
    }

    // batch records stay buffered here until their commit sentinel shows
    // up; batches still pending at the end of the replay were never
    // committed and are dropped
    let mut pending_batches: HashMap<u64, Vec<TransactionRecord>> = HashMap::new();

    let active_file = self.active_data_file.read();
    let older_files = self.old_data_files.read();

    for (i, file_id) in self.file_ids.iter().enumerate() {
      let mut offset = 0;
      loop {
        let read_res = if *file_id == active_file.get_file_id() {
          active_file.read_log_record(offset)
        } else {
          match older_files.get(file_id) {
            Some(data_file) => data_file.read_log_record(offset),
            None => return Err(Errors::DataFileNotFound),
          }
        };

        let (record, size) = match read_res {
          Ok(res) => (res.record, res.size),
          Err(Errors::ReadDataFileEOF) => break,
          Err(e) => return Err(e),
        };

        let pos = LogRecordPos {
          file_id: *file_id,
          offset,
        };

        let (real_key, seq_no) = parse_log_record_key(&record.key);
        if seq_no == NON_TXN_SEQ_NO {
          self.update_index(real_key, record.rec_type, pos);
        } else if record.rec_type == LogRecordType::TxnFinished {
          // the sentinel makes every buffered record of the batch visible
          if let Some(records) = pending_batches.remove(&seq_no) {
            for txn_record in records {
              self.update_index(
                txn_record.record.key,
                txn_record.record.rec_type,
                txn_record.pos,
              );
            }
          }
        } else {
          pending_batches
            .entry(seq_no)
            .or_default()
            .push(TransactionRecord {
              record: LogRecord {
                key: real_key,
                value: record.value,
                rec_type: record.rec_type,
              },
              pos,
            });
        }

        if seq_no > max_seq_no {
          max_seq_no = seq_no;
        }

        offset += size;
      }

      // the last file keeps receiving appends, continue from the scan end
      if i == self.file_ids.len() - 1 {
        active_file.set_write_off(offset);
      }
    }

    Ok(max_seq_no)
  }

  fn update_index(&self, key: Vec<u8>, rec_type: LogRecordType, pos: LogRecordPos) {
    if rec_type == LogRecordType::Normal {
      self.index.put(key, pos);
    } else if rec_type == LogRecordType::Deleted {
      self.index.delete(key);
    }
  }

  /// After an mmap-backed replay, reopens every file with standard file
  /// I/O so the active file accepts writes again.
  fn reset_io_type(&self) -> Result<()> {
    let mut active_file = self.active_data_file.write();
    active_file.set_io_manager(&self.options.dir_path, IOManagerType::StandardFileIO)?;

    let mut older_files = self.old_data_files.write();
    for (_, data_file) in older_files.iter_mut() {
      data_file.set_io_manager(&self.options.dir_path, IOManagerType::StandardFileIO)?;
    }
    Ok(())
  }

  /// Flushes the active data file to disk.
  pub fn sync(&self) -> Result<()> {
    let read_guard = self.active_data_file.read();
    read_guard.sync()
  }

  /// Persists the active file. File handles close when the engine drops.
  pub fn close(&self) -> Result<()> {
    if !self.options.dir_path.is_dir() {
      return Ok(());
    }
    self.sync()
  }

  /// Reports key and file counts plus the directory footprint on disk.
  pub fn stat(&self) -> Result<Stat> {
    let keys = self.index.list_keys()?;
    let older_files = self.old_data_files.read();

    Ok(Stat {
      key_num: keys.len(),
      data_file_num: older_files.len() + 1,
      disk_size: util::file::dir_disk_size(&self.options.dir_path),
    })
  }
}

impl Drop for Engine {
  fn drop(&mut self) {
    if let Err(e) = self.close() {
      error!("error while closing engine: {}", e);
    }
  }
}

fn check_options(opts: &Options) -> Result<()> {
  let dir_path = opts.dir_path.to_str();
  if dir_path.is_none() || dir_path.unwrap().is_empty() {
    return Err(Errors::DirPathIsEmpty);
  }
  if opts.data_file_size == 0 {
    return Err(Errors::DataFileSizeTooSmall);
  }
  Ok(())
}

/// Opens every data file in the directory, sorted by ascending id. A
/// data-suffixed file whose stem is not numeric means the directory has
/// been tampered with.
fn load_data_files<P>(dir_path: P, io_type: IOManagerType) -> Result<Vec<DataFile>>
where
  P: AsRef<Path>,
{
  let dir = match fs::read_dir(&dir_path) {
    Ok(dir) => dir,
    Err(e) => {
      error!("failed to read database directory error: {}", e);
      return Err(Errors::FailedToReadDatabaseDir);
    }
  };

  let mut file_ids = Vec::new();
  for entry in dir.flatten() {
    let file_os_str = entry.file_name();
    let file_name = file_os_str.to_string_lossy();

    if let Some(stem) = file_name.strip_suffix(DATA_FILE_NAME_SUFFIX) {
      match stem.parse::<u32>() {
        Ok(file_id) => file_ids.push(file_id),
        Err(_) => return Err(Errors::DataDirectoryCorrupted),
      };
    }
  }

  file_ids.sort_unstable();

  let mut data_files = Vec::with_capacity(file_ids.len());
  for file_id in file_ids {
    data_files.push(DataFile::new(&dir_path, file_id, io_type)?);
  }
  Ok(data_files)
}
