//! Backup creation and listing.
//!
//! `BackupService` is an explicit value owning its configuration and
//! capability handles; nothing here is process-global. At most one backup
//! or restore runs at a time: the public entry points take the advisory
//! in-flight lock with `try_lock` and refuse instead of queueing.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::task;
use tracing::{error, info, warn};

use crate::config::BackupConfig;
use crate::constants::{BACKUP_EXT, BACKUP_PREFIX, FREE_SPACE_FLOOR, FREE_SPACE_MULTIPLIER, WAL_SUFFIX};
use crate::db::{AppLifecycle, LiveDatabase, SecretProvider};
use crate::error::{BackupError, Result};
use crate::paths::{sidecar_path, staging_path, BackupPaths};
use crate::retention;
use crate::swap;
use crate::types::{BackupOutcome, BackupRecord};
use crate::verify::verify_database_file;

/// Backup engine for one live database.
#[derive(Clone)]
pub struct BackupService {
  pub(crate) config: BackupConfig,
  pub(crate) paths: BackupPaths,
  pub(crate) db: Arc<dyn LiveDatabase>,
  pub(crate) secrets: Arc<dyn SecretProvider>,
  pub(crate) lifecycle: Arc<dyn AppLifecycle>,
  pub(crate) in_flight: Arc<Mutex<()>>,
}

impl BackupService {
  pub fn new(
    config: BackupConfig,
    db: Arc<dyn LiveDatabase>,
    secrets: Arc<dyn SecretProvider>,
    lifecycle: Arc<dyn AppLifecycle>,
  ) -> Self {
    let paths = BackupPaths::new(config.backup_dir.clone());
    Self {
      config,
      paths,
      db,
      secrets,
      lifecycle,
      in_flight: Arc::new(Mutex::new(())),
    }
  }

  /// Create a labelled backup in the backup directory.
  ///
  /// Never returns an error: every failure is folded into the outcome.
  pub async fn create_backup(&self, label: &str) -> BackupOutcome {
    let service = self.clone();
    let label = label.to_string();
    match task::spawn_blocking(move || service.create_backup_blocking(&label)).await {
      Ok(outcome) => outcome,
      Err(join) => BackupOutcome::failed(format!("backup task failed: {join}")),
    }
  }

  /// Create a backup at a caller-supplied absolute path, skipping the
  /// stamped naming, directory management, and retention.
  ///
  /// A pre-existing file at `target` is only ever replaced after the new
  /// content is copied and verified; the copy path itself never deletes it.
  pub async fn create_backup_to_path(&self, target: impl Into<PathBuf>) -> BackupOutcome {
    let service = self.clone();
    let target = target.into();
    match task::spawn_blocking(move || service.create_backup_to_path_blocking(&target)).await {
      Ok(outcome) => outcome,
      Err(join) => BackupOutcome::failed(format!("backup task failed: {join}")),
    }
  }

  /// List promoted backups, newest first.
  ///
  /// Never errors: any listing failure yields an empty list, and entries
  /// with unreadable metadata are skipped.
  pub fn list_backups(&self) -> Vec<BackupRecord> {
    match self.list_backups_inner() {
      Ok(records) => records,
      Err(listing) => {
        warn!(error = %listing, "listing backups failed");
        Vec::new()
      }
    }
  }

  // ==========================================================================
  // Blocking pipeline
  // ==========================================================================

  fn create_backup_blocking(&self, label: &str) -> BackupOutcome {
    let Some(_guard) = self.in_flight.try_lock() else {
      return BackupOutcome::failed(BackupError::Busy.to_string());
    };
    match self.create_backup_inner(label) {
      Ok(path) => BackupOutcome::ok(path),
      Err(creation) => {
        error!(label, error = %creation, "backup creation failed");
        BackupOutcome::failed(creation.to_string())
      }
    }
  }

  fn create_backup_to_path_blocking(&self, target: &Path) -> BackupOutcome {
    let Some(_guard) = self.in_flight.try_lock() else {
      return BackupOutcome::failed(BackupError::Busy.to_string());
    };
    match self.create_backup_to_path_inner(target) {
      Ok(path) => BackupOutcome::ok(path),
      Err(creation) => {
        error!(target = %target.display(), error = %creation, "backup creation failed");
        BackupOutcome::failed(creation.to_string())
      }
    }
  }

  /// Full creation pipeline. The in-flight lock must already be held; the
  /// restore path reuses this for its safety backup.
  pub(crate) fn create_backup_inner(&self, label: &str) -> Result<PathBuf> {
    if !self.db.is_open() {
      return Err(BackupError::NotInitialized);
    }
    self.paths.ensure_backup_dir()?;
    self.check_free_space()?;

    let dest = self.paths.stamped_backup_path(label);
    let staging = staging_path(&dest);
    if let Err(creation) = self.copy_and_verify(&staging) {
      remove_staging(&staging);
      return Err(creation);
    }
    swap::replace_file(&staging, &dest)?;

    let records = self.list_backups();
    retention::apply(&self.paths, &records, Utc::now(), &self.config);

    info!(path = %dest.display(), "backup created");
    Ok(dest)
  }

  fn create_backup_to_path_inner(&self, target: &Path) -> Result<PathBuf> {
    if !self.db.is_open() {
      return Err(BackupError::NotInitialized);
    }
    let staging = staging_path(target);
    if let Err(creation) = self.copy_and_verify(&staging) {
      remove_staging(&staging);
      return Err(creation);
    }
    swap::replace_file(&staging, target)?;

    info!(path = %target.display(), "backup created at explicit path");
    Ok(target.to_path_buf())
  }

  /// Engine-consistent copy into `staging`, then structural verification.
  /// An unverified copy never leaves this function alive.
  fn copy_and_verify(&self, staging: &Path) -> Result<()> {
    self.db.backup_to(staging)?;
    let secret = self.secrets.encryption_secret().ok();
    if !verify_database_file(staging, secret.as_deref()) {
      return Err(BackupError::IntegrityFailure(
        staging.display().to_string(),
      ));
    }
    Ok(())
  }

  fn list_backups_inner(&self) -> Result<Vec<BackupRecord>> {
    self.paths.ensure_backup_dir()?;

    let mut records = Vec::new();
    for entry in fs::read_dir(self.paths.backup_dir())? {
      let entry = entry?;
      let filename = entry.file_name().to_string_lossy().into_owned();
      if !filename.starts_with(BACKUP_PREFIX) || !filename.ends_with(BACKUP_EXT) {
        // Staging files, rollback sidecars, and foreign files are not
        // part of the catalog.
        continue;
      }
      let metadata = match entry.metadata() {
        Ok(metadata) => metadata,
        Err(meta) => {
          warn!(file = %filename, error = %meta, "skipping backup entry with unreadable metadata");
          continue;
        }
      };
      if !metadata.is_file() {
        continue;
      }
      let created_at: DateTime<Utc> = metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| DateTime::<Utc>::MIN_UTC);
      records.push(BackupRecord {
        filename,
        size_bytes: metadata.len(),
        created_at,
      });
    }

    // The stamp embedded in the filename breaks same-instant ties.
    records.sort_by(|a, b| {
      b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.filename.cmp(&a.filename))
    });
    Ok(records)
  }

  /// Require room for roughly two copies of the database and its WAL
  /// before starting a copy, so a full disk fails fast instead of
  /// mid-stream.
  fn check_free_space(&self) -> Result<()> {
    let db_path = self.db.path();
    let db_len = file_len(&db_path);
    let wal_len = file_len(&sidecar_path(&db_path, WAL_SUFFIX));
    let required = (db_len + wal_len) * FREE_SPACE_MULTIPLIER + FREE_SPACE_FLOOR;
    let available = fs2::available_space(self.paths.backup_dir())?;
    if available < required {
      return Err(BackupError::Internal(format!(
        "not enough free space for backup: {available} bytes available, {required} required"
      )));
    }
    Ok(())
  }
}

fn file_len(path: &Path) -> u64 {
  fs::metadata(path).map(|metadata| metadata.len()).unwrap_or(0)
}

/// Best-effort removal of an abandoned staging file.
pub(crate) fn remove_staging(staging: &Path) {
  if staging.exists() {
    if let Err(cleanup) = fs::remove_file(staging) {
      warn!(staging = %staging.display(), error = %cleanup, "failed to remove staging file");
    }
  }
}
