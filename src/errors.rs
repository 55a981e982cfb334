use std::result;

use thiserror::Error;

/// Every failure the engine surfaces to callers. The variants are
/// comparable so tests and recovery code can match on exact conditions.
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
pub enum Errors {
  #[error("failed to open data file")]
  FailedToOpenDataFile,

  #[error("failed to read from data file")]
  FailedToReadFromDataFile,

  #[error("failed to write to data file")]
  FailedToWriteToDataFile,

  #[error("failed to sync data file")]
  FailedToSyncDataFile,

  #[error("the key is empty")]
  KeyIsEmpty,

  #[error("key not found in database")]
  KeyNotFound,

  #[error("failed to update index")]
  IndexUpdateFailed,

  #[error("data file is not found in database")]
  DataFileNotFound,

  #[error("database dir path can not be empty")]
  DirPathIsEmpty,

  #[error("database data file size must be greater than 0")]
  DataFileSizeTooSmall,

  #[error("failed to create the database directory")]
  FailedToCreateDatabaseDir,

  #[error("failed to read the database directory")]
  FailedToReadDatabaseDir,

  #[error("the database directory maybe corrupted")]
  DataDirectoryCorrupted,

  #[error("read data file eof")]
  ReadDataFileEOF,

  #[error("invalid crc value, log record maybe corrupted")]
  InvalidLogRecordCrc,

  #[error("exceed the max batch num")]
  ExceedMaxBatchNum,
}

pub type Result<T> = result::Result<T, Errors>;
