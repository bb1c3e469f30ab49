//! Service configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
  AGE_BUCKET, BACKUP_DIR_NAME, MAX_AGE, MAX_BACKUPS, STALE_AFTER, TICK_INTERVAL,
};

/// Configuration for one [`BackupService`](crate::service::BackupService)
/// value.
///
/// Everything an instance needs is injected here, so tests can run many
/// isolated services side by side instead of sharing process-wide state.
#[derive(Debug, Clone)]
pub struct BackupConfig {
  /// Directory holding promoted backups. Created lazily.
  pub backup_dir: PathBuf,
  /// Rolling count of most-recent backups always kept.
  pub max_backups: usize,
  /// Age cutoff after which only one backup per older bucket survives.
  pub max_age: Duration,
  /// Width of one older-backup bucket.
  pub age_bucket: Duration,
  /// Schedule tick cadence.
  pub tick_interval: Duration,
  /// A newest backup older than this is refreshed by the schedule.
  pub stale_after: Duration,
}

impl BackupConfig {
  /// Defaults rooted at the application's private data directory.
  pub fn new(data_dir: impl Into<PathBuf>) -> Self {
    Self {
      backup_dir: data_dir.into().join(BACKUP_DIR_NAME),
      max_backups: MAX_BACKUPS,
      max_age: MAX_AGE,
      age_bucket: AGE_BUCKET,
      tick_interval: TICK_INTERVAL,
      stale_after: STALE_AFTER,
    }
  }
}
