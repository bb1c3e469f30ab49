//! Restore pipeline.
//!
//! A restore walks a fixed sequence of stages; every stage after filename
//! validation can fail terminally, and a failure leaves the live database
//! unmodified up to and including the last completed stage. The safety
//! backup taken before anything destructive is the operator's recovery
//! path when a later stage fails.

use std::fs;
use std::path::Path;

use tokio::task;
use tracing::{error, info, warn};

use crate::constants::{PRE_RESTORE_LABEL, SHM_SUFFIX, WAL_SUFFIX};
use crate::error::{BackupError, Result};
use crate::paths::{sidecar_path, staging_path};
use crate::service::{remove_staging, BackupService};
use crate::swap;
use crate::verify::verify_database_file;

/// Stages of a restore, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreStage {
  Validating,
  IntegrityChecking,
  SafetyBackingUp,
  Closing,
  Swapping,
  SidecarSyncing,
  RequestingRestart,
}

impl RestoreStage {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Validating => "validating",
      Self::IntegrityChecking => "integrity-checking",
      Self::SafetyBackingUp => "safety-backing-up",
      Self::Closing => "closing",
      Self::Swapping => "swapping",
      Self::SidecarSyncing => "sidecar-syncing",
      Self::RequestingRestart => "requesting-restart",
    }
  }
}

type StageResult<T> = std::result::Result<T, (RestoreStage, BackupError)>;

impl BackupService {
  /// Restore the live database from a backup filename inside the backup
  /// directory.
  ///
  /// The only error is the invalid-filename precondition, raised before
  /// any filesystem access. Every later failure is logged and returned as
  /// `Ok(false)`, and the live database file is untouched up to the last
  /// completed stage.
  pub async fn restore_backup(&self, filename: &str) -> Result<bool> {
    let candidate = self.paths.resolve_backup_filename(filename)?;

    let service = self.clone();
    match task::spawn_blocking(move || service.restore_blocking(&candidate)).await {
      Ok(restored) => Ok(restored),
      Err(join) => {
        error!(error = %join, "restore task failed");
        Ok(false)
      }
    }
  }

  fn restore_blocking(&self, candidate: &Path) -> bool {
    let Some(_guard) = self.in_flight.try_lock() else {
      warn!("restore refused: another backup or restore is running");
      return false;
    };
    match self.restore_inner(candidate) {
      Ok(()) => true,
      Err((stage, failure)) => {
        error!(
          stage = stage.as_str(),
          candidate = %candidate.display(),
          error = %failure,
          "restore failed"
        );
        false
      }
    }
  }

  fn restore_inner(&self, candidate: &Path) -> StageResult<()> {
    if !candidate.exists() {
      return Err((
        RestoreStage::Validating,
        BackupError::Internal(format!("backup file does not exist: {}", candidate.display())),
      ));
    }

    // The live database stays untouched unless the candidate proves sound.
    let secret = self.secrets.encryption_secret().ok();
    if !verify_database_file(candidate, secret.as_deref()) {
      return Err((
        RestoreStage::IntegrityChecking,
        BackupError::IntegrityFailure(candidate.display().to_string()),
      ));
    }

    // Restoring never proceeds without a fallback on disk.
    if let Err(safety) = self.create_backup_inner(PRE_RESTORE_LABEL) {
      return Err((
        RestoreStage::SafetyBackingUp,
        BackupError::SafetyBackupFailure(safety.to_string()),
      ));
    }

    self.db.close();

    let db_path = self.db.path();
    let staging = staging_path(&db_path);
    if let Err((stage, failure)) = self.swap_in_candidate(candidate, &db_path, &staging) {
      remove_staging(&staging);
      return Err((stage, failure));
    }

    // The swapped file can only be observed correctly by a fresh process.
    info!(candidate = %candidate.display(), "restore complete, requesting restart");
    self.lifecycle.relaunch();
    self.lifecycle.exit(0);
    Ok(())
  }

  fn swap_in_candidate(
    &self,
    candidate: &Path,
    db_path: &Path,
    staging: &Path,
  ) -> StageResult<()> {
    fs::copy(candidate, staging)
      .map_err(|copy| (RestoreStage::Swapping, BackupError::from(copy)))?;
    swap::replace_file(staging, db_path).map_err(|promote| (RestoreStage::Swapping, promote))?;

    // The side-file set must exactly mirror what the snapshot had at
    // backup time; a stale WAL would replay old records against the new
    // base file.
    for suffix in [WAL_SUFFIX, SHM_SUFFIX] {
      let snapshot_side = sidecar_path(candidate, suffix);
      let live_side = sidecar_path(db_path, suffix);
      if snapshot_side.exists() {
        fs::copy(&snapshot_side, &live_side)
          .map_err(|copy| (RestoreStage::SidecarSyncing, BackupError::from(copy)))?;
      } else if live_side.exists() {
        fs::remove_file(&live_side)
          .map_err(|remove| (RestoreStage::SidecarSyncing, BackupError::from(remove)))?;
      }
    }
    Ok(())
  }
}
