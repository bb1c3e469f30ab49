//! Atomic file replacement.
//!
//! [`replace_file`] moves a fully-written staging file over a target path
//! such that the target is never missing or half-written afterwards,
//! whether the call succeeds or fails. Only same-volume renames touch the
//! target; a `*.previous-<ts>` rollback sidecar bridges the window between
//! parking the old file and landing the new one. A crash inside that window
//! leaves a sidecar-present state the same rollback steps repair.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{error, warn};

use crate::constants::PREVIOUS_MARKER;
use crate::error::Result;

/// Rollback sidecar path for `target`: the full filename with
/// `.previous-<epochMillis>` appended.
fn previous_path(target: &Path) -> PathBuf {
  let millis = SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_millis();
  let base = target
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_default();
  target.with_file_name(format!("{base}{PREVIOUS_MARKER}{millis}"))
}

/// Replace `target` with the fully-written file at `temp`.
///
/// If `target` exists it is parked under a rollback sidecar first; when the
/// promotion rename fails, the sidecar is moved back so the prior file is
/// intact and the original error is returned. The staging file is removed
/// best-effort in every outcome.
pub fn replace_file(temp: &Path, target: &Path) -> Result<()> {
  let outcome = replace_inner(temp, target);
  if temp.exists() {
    if let Err(cleanup) = fs::remove_file(temp) {
      warn!(
        temp = %temp.display(),
        error = %cleanup,
        "failed to remove staging file"
      );
    }
  }
  outcome
}

fn replace_inner(temp: &Path, target: &Path) -> Result<()> {
  let parked = if target.exists() {
    let sidecar = previous_path(target);
    fs::rename(target, &sidecar)?;
    Some(sidecar)
  } else {
    None
  };

  match fs::rename(temp, target) {
    Ok(()) => {
      if let Some(sidecar) = parked {
        if let Err(cleanup) = fs::remove_file(&sidecar) {
          warn!(
            sidecar = %sidecar.display(),
            error = %cleanup,
            "failed to remove rollback sidecar"
          );
        }
      }
      sync_parent_dir(target.parent())?;
      Ok(())
    }
    Err(promote) => {
      if let Some(sidecar) = parked {
        // A partial file at the target must not shadow the rollback rename.
        if target.exists() {
          if let Err(cleanup) = fs::remove_file(target) {
            warn!(
              target = %target.display(),
              error = %cleanup,
              "failed to clear partial target before rollback"
            );
          }
        }
        if let Err(rollback) = fs::rename(&sidecar, target) {
          error!(
            sidecar = %sidecar.display(),
            target = %target.display(),
            error = %rollback,
            "rollback rename failed; previous file remains under the sidecar name"
          );
        }
      }
      Err(promote.into())
    }
  }
}

fn sync_parent_dir(parent: Option<&Path>) -> Result<()> {
  #[cfg(unix)]
  {
    if let Some(parent) = parent {
      let directory = File::open(parent)?;
      directory.sync_all()?;
    }
  }

  #[cfg(not(unix))]
  {
    let _ = parent;
  }

  Ok(())
}
