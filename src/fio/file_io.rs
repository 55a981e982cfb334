use std::{
  fs::{File, OpenOptions},
  io::Write,
  path::Path,
  sync::Arc,
};

use log::error;
use parking_lot::RwLock;

use crate::errors::{Errors, Result};

use super::IOManager;

/// Standard file system I/O backed by an OS file handle.
pub struct FileIO {
  fd: Arc<RwLock<File>>,
}

impl FileIO {
  pub fn new<P>(file_name: P) -> Result<Self>
  where
    P: AsRef<Path>,
  {
    match OpenOptions::new()
      .create(true)
      .read(true)
      .append(true)
      .open(file_name)
    {
      Ok(file) => Ok(FileIO {
        fd: Arc::new(RwLock::new(file)),
      }),
      Err(e) => {
        error!("failed to open data file error: {}", e);
        Err(Errors::FailedToOpenDataFile)
      }
    }
  }
}

impl IOManager for FileIO {
  fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
    let read_guard = self.fd.read();

    #[cfg(unix)]
    let res = {
      use std::os::unix::fs::FileExt;
      read_guard.read_at(buf, offset)
    };

    #[cfg(windows)]
    let res = {
      use std::os::windows::fs::FileExt;
      read_guard.seek_read(buf, offset)
    };

    match res {
      Ok(n) => Ok(n),
      Err(e) => {
        error!("read from data file error: {}", e);
        Err(Errors::FailedToReadFromDataFile)
      }
    }
  }

  fn write(&self, buf: &[u8]) -> Result<usize> {
    let mut write_guard = self.fd.write();
    match write_guard.write(buf) {
      Ok(n) => Ok(n),
      Err(e) => {
        error!("write to data file error: {}", e);
        Err(Errors::FailedToWriteToDataFile)
      }
    }
  }

  fn sync(&self) -> Result<()> {
    let read_guard = self.fd.read();
    if let Err(e) = read_guard.sync_all() {
      error!("failed to sync data file error: {}", e);
      return Err(Errors::FailedToSyncDataFile);
    }
    Ok(())
  }

  fn size(&self) -> u64 {
    let read_guard = self.fd.read();
    match read_guard.metadata() {
      Ok(metadata) => metadata.len(),
      Err(e) => {
        error!("failed to read data file metadata error: {}", e);
        0
      }
    }
  }
}
