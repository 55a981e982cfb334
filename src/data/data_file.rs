use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use parking_lot::RwLock;

use crate::{
  errors::{Errors, Result},
  fio::{new_io_manager, IOManager},
  option::IOManagerType,
};

use super::log_record::{
  decode_log_record_header, get_log_record_crc, max_log_record_header_size, LogRecord,
  LogRecordType,
};

pub const DATA_FILE_NAME_SUFFIX: &str = ".data";

/// One append-only segment of the database. At most one data file, the
/// one with the highest id, ever receives writes.
pub struct DataFile {
  file_id: Arc<RwLock<u32>>,
  write_off: Arc<RwLock<u64>>,
  io_manager: Box<dyn IOManager>,
}

/// A decoded record and the number of bytes its frame occupies on disk.
#[derive(Debug)]
pub struct ReadLogRecordRes {
  pub(crate) record: LogRecord,
  pub(crate) size: u64,
}

pub fn get_data_file_name<P>(dir_path: P, file_id: u32) -> PathBuf
where
  P: AsRef<Path>,
{
  let name = std::format!("{:09}{}", file_id, DATA_FILE_NAME_SUFFIX);
  dir_path.as_ref().join(name)
}

impl DataFile {
  pub fn new<P>(dir_path: P, file_id: u32, io_type: IOManagerType) -> Result<DataFile>
  where
    P: AsRef<Path>,
  {
    let file_name = get_data_file_name(dir_path, file_id);
    let io_manager = new_io_manager(file_name, &io_type)?;

    Ok(DataFile {
      file_id: Arc::new(RwLock::new(file_id)),
      write_off: Arc::new(RwLock::new(0)),
      io_manager,
    })
  }

  pub fn get_file_id(&self) -> u32 {
    *self.file_id.read()
  }

  pub fn get_write_off(&self) -> u64 {
    *self.write_off.read()
  }

  pub fn set_write_off(&self, offset: u64) {
    *self.write_off.write() = offset;
  }

  /// Decodes the record starting at `offset`.
  ///
  /// A scan that runs off the written region surfaces `ReadDataFileEOF`;
  /// a frame whose crc does not match surfaces `InvalidLogRecordCrc`.
  pub fn read_log_record(&self, offset: u64) -> Result<ReadLogRecordRes> {
    let file_size = self.io_manager.size();
    if offset >= file_size {
      return Err(Errors::ReadDataFileEOF);
    }

    // clamp the speculative header read so it never runs past the tail
    let mut header_len = max_log_record_header_size();
    if offset + header_len as u64 > file_size {
      header_len = (file_size - offset) as usize;
    }

    let mut header_buf = vec![0u8; header_len];
    self.io_manager.read(&mut header_buf, offset)?;

    let (header, header_size) = match decode_log_record_header(&header_buf) {
      Some(res) => res,
      None => return Err(Errors::ReadDataFileEOF),
    };

    // an all-zero header means the scan reached pre-allocated space
    if header.crc == 0 && header.key_size == 0 && header.value_size == 0 {
      return Err(Errors::ReadDataFileEOF);
    }

    let mut body_buf = vec![0u8; header.key_size + header.value_size];
    self
      .io_manager
      .read(&mut body_buf, offset + header_size as u64)?;

    let value = body_buf.split_off(header.key_size);
    let record = LogRecord {
      key: body_buf,
      value,
      rec_type: LogRecordType::from_u8(header.rec_type)?,
    };

    if get_log_record_crc(&record, &header_buf[4..header_size]) != header.crc {
      return Err(Errors::InvalidLogRecordCrc);
    }

    Ok(ReadLogRecordRes {
      record,
      size: (header_size + header.key_size + header.value_size) as u64,
    })
  }

  pub fn write(&self, buf: &[u8]) -> Result<usize> {
    let n_bytes = self.io_manager.write(buf)?;
    *self.write_off.write() += n_bytes as u64;
    Ok(n_bytes)
  }

  pub fn sync(&self) -> Result<()> {
    self.io_manager.sync()
  }

  /// Swaps the I/O backend, used after an mmap replay to hand the file
  /// back to standard file I/O.
  pub fn set_io_manager<P>(&mut self, dir_path: P, io_type: IOManagerType) -> Result<()>
  where
    P: AsRef<Path>,
  {
    let file_name = get_data_file_name(dir_path, self.get_file_id());
    self.io_manager = new_io_manager(file_name, &io_type)?;
    Ok(())
  }
}
