//! Record types crossing the IPC boundary.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One promoted backup file, derived by listing the backup directory.
///
/// The filesystem is the catalog: records are never persisted as a separate
/// index and never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
  /// Plain filename directly inside the backup directory.
  pub filename: String,
  /// Size of the backup file in bytes.
  pub size_bytes: u64,
  /// Creation time reported by the filesystem.
  pub created_at: DateTime<Utc>,
}

/// Outcome of a backup creation request, shaped for the IPC layer.
///
/// Backup creation never surfaces an error to its caller; failures land
/// here as a message instead.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupOutcome {
  pub success: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub path: Option<PathBuf>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl BackupOutcome {
  pub fn ok(path: PathBuf) -> Self {
    Self {
      success: true,
      path: Some(path),
      error: None,
    }
  }

  pub fn failed(error: impl Into<String>) -> Self {
    Self {
      success: false,
      path: None,
      error: Some(error.into()),
    }
  }
}
