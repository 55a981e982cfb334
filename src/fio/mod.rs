pub mod file_io;
pub mod mmap;

use std::path::Path;

use crate::{errors::Result, option::IOManagerType};

use self::{file_io::FileIO, mmap::MMapIO};

/// Abstract I/O capability over a single data file. Handles close on
/// drop.
pub trait IOManager: Sync + Send {
  /// Fills `buf` from the file starting at `offset`.
  fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize>;

  /// Appends `buf` to the file.
  fn write(&self, buf: &[u8]) -> Result<usize>;

  fn sync(&self) -> Result<()>;

  fn size(&self) -> u64;
}

pub fn new_io_manager<P>(filename: P, io_type: &IOManagerType) -> Result<Box<dyn IOManager>>
where
  P: AsRef<Path>,
{
  match *io_type {
    IOManagerType::StandardFileIO => Ok(Box::new(FileIO::new(filename)?)),
    IOManagerType::MemoryMap => Ok(Box::new(MMapIO::new(filename)?)),
  }
}
