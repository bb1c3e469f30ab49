//! Backup directory and filename handling.
//!
//! Filenames arriving from the UI layer are untrusted; they are validated
//! here before any filesystem access happens.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{SecondsFormat, Utc};
use rand::Rng;

use crate::constants::{BACKUP_EXT, BACKUP_PREFIX};
use crate::error::{BackupError, Result};

/// Resolves every path the backup engine touches.
#[derive(Debug, Clone)]
pub struct BackupPaths {
  backup_dir: PathBuf,
}

impl BackupPaths {
  pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
    Self {
      backup_dir: backup_dir.into(),
    }
  }

  pub fn backup_dir(&self) -> &Path {
    &self.backup_dir
  }

  /// Create the backup directory if it does not exist yet.
  pub fn ensure_backup_dir(&self) -> Result<()> {
    fs::create_dir_all(&self.backup_dir)?;
    Ok(())
  }

  /// Destination path for a new backup:
  /// `backup-<label>-<stamp>.sqlite`, where the stamp is ISO-8601 UTC with
  /// `:` and `.` replaced so the name is legal on every filesystem.
  pub fn stamped_backup_path(&self, label: &str) -> PathBuf {
    let stamp = Utc::now()
      .to_rfc3339_opts(SecondsFormat::Millis, true)
      .replace([':', '.'], "-");
    self
      .backup_dir
      .join(format!("{BACKUP_PREFIX}{label}-{stamp}{BACKUP_EXT}"))
  }

  /// Validate an untrusted backup filename and resolve it inside the
  /// backup directory.
  ///
  /// Rejects path separators, a missing backup extension, and any
  /// resolution that does not keep the backup directory as a strict
  /// prefix.
  pub fn resolve_backup_filename(&self, name: &str) -> Result<PathBuf> {
    if name.is_empty() || name.contains('/') || name.contains('\\') {
      return Err(BackupError::InvalidFilename(name.to_string()));
    }
    if !name.ends_with(BACKUP_EXT) {
      return Err(BackupError::InvalidFilename(name.to_string()));
    }
    let resolved = self.backup_dir.join(name);
    if !resolved.starts_with(&self.backup_dir) {
      return Err(BackupError::InvalidFilename(name.to_string()));
    }
    Ok(resolved)
  }
}

/// Same-directory staging path for `target`:
/// `.<basename>.tmp-<epochMillis>-<random5>`.
///
/// Staging files must share the target's volume so promotion is a rename.
pub fn staging_path(target: &Path) -> PathBuf {
  let millis = SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_millis();
  let suffix: u32 = rand::thread_rng().gen_range(10_000..100_000);
  let base = target
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_else(|| "db".to_string());
  let dir = target.parent().unwrap_or_else(|| Path::new("."));
  dir.join(format!(".{base}.tmp-{millis}-{suffix}"))
}

/// Durability side-file path for `db_path`: the full database filename with
/// `suffix` appended (`rollbook.sqlite` -> `rollbook.sqlite-wal`).
pub fn sidecar_path(db_path: &Path, suffix: &str) -> PathBuf {
  let base = db_path
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_default();
  db_path.with_file_name(format!("{base}{suffix}"))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::constants::{SHM_SUFFIX, WAL_SUFFIX};

  #[test]
  fn stamped_names_are_filesystem_safe() {
    let paths = BackupPaths::new("/data/backups");
    let path = paths.stamped_backup_path("auto");
    let name = path.file_name().expect("file name").to_string_lossy();

    assert!(name.starts_with("backup-auto-"));
    assert!(name.ends_with(".sqlite"));
    let stamp = name
      .trim_start_matches("backup-auto-")
      .trim_end_matches(".sqlite");
    assert!(!stamp.contains(':'));
    assert!(!stamp.contains('.'));
    assert!(stamp.ends_with('Z'));
  }

  #[test]
  fn traversal_and_extension_mismatches_are_rejected() {
    let paths = BackupPaths::new("/data/backups");

    for name in [
      "../outside.sqlite",
      "sub/dir.sqlite",
      "..\\outside.sqlite",
      "backup.txt",
      "",
    ] {
      let err = paths
        .resolve_backup_filename(name)
        .expect_err("name must be rejected");
      assert!(matches!(err, BackupError::InvalidFilename(_)), "{name}");
    }
  }

  #[test]
  fn plain_names_resolve_inside_the_backup_dir() {
    let paths = BackupPaths::new("/data/backups");
    let resolved = paths
      .resolve_backup_filename("backup-auto-2026-02-14T08-00-00-000Z.sqlite")
      .expect("valid name");
    assert!(resolved.starts_with("/data/backups"));
  }

  #[test]
  fn staging_paths_stay_in_the_target_directory() {
    let staging = staging_path(Path::new("/data/backups/backup-x.sqlite"));
    assert_eq!(staging.parent(), Some(Path::new("/data/backups")));
    let name = staging.file_name().expect("file name").to_string_lossy();
    assert!(name.starts_with(".backup-x.sqlite.tmp-"));
  }

  #[test]
  fn sidecar_paths_append_to_the_full_filename() {
    let db = Path::new("/data/rollbook.sqlite");
    assert_eq!(
      sidecar_path(db, WAL_SUFFIX),
      Path::new("/data/rollbook.sqlite-wal")
    );
    assert_eq!(
      sidecar_path(db, SHM_SUFFIX),
      Path::new("/data/rollbook.sqlite-shm")
    );
  }
}
