//! Error types for the backup engine.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, BackupError>;

#[derive(Error, Debug)]
pub enum BackupError {
  /// No live database is open to back up.
  #[error("database is not initialized")]
  NotInitialized,

  /// A restore was requested with a name that is not a plain backup
  /// filename inside the backup directory.
  #[error("invalid backup filename: {0}")]
  InvalidFilename(String),

  /// A candidate file failed every verification attempt.
  #[error("integrity validation failed: {0}")]
  IntegrityFailure(String),

  /// The pre-restore snapshot of the live database could not be created.
  #[error("safety backup failed: {0}")]
  SafetyBackupFailure(String),

  /// Another backup or restore already holds the in-flight lock.
  #[error("a backup or restore operation is already running")]
  Busy,

  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("{0}")]
  Internal(String),
}
