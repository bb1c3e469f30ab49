//! Structural verification of candidate database files.
//!
//! Verification is a boolean predicate and never errors: any failure inside
//! an attempt counts as a failed attempt. The keyed attempt runs first and
//! a plain attempt covers legacy unencrypted files. The check is
//! best-effort by construction — when a probe passes, the verifier cannot
//! distinguish "correct key" from "plain file that happens to read
//! cleanly"; its answer is only the OR of the two attempts.

use std::path::Path;

use rusqlite::{Connection, OpenFlags};
use tracing::{debug, warn};

use crate::error::{BackupError, Result};

/// Verify that the file at `path` is a structurally sound database.
///
/// `secret` is tried first when present; a plain open is tried when the
/// keyed attempt fails for any reason.
pub fn verify_database_file(path: &Path, secret: Option<&str>) -> bool {
  if let Some(secret) = secret {
    match probe(path, Some(secret)) {
      Ok(()) => return true,
      Err(error) => debug!(
        path = %path.display(),
        %error,
        "keyed verification attempt failed; retrying plain"
      ),
    }
  }

  match probe(path, None) {
    Ok(()) => true,
    Err(error) => {
      warn!(path = %path.display(), %error, "verification failed on all attempts");
      false
    }
  }
}

fn probe(path: &Path, secret: Option<&str>) -> Result<()> {
  let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
  if let Some(secret) = secret {
    conn.pragma_update(None, "key", secret)?;
  }

  // Cheap metadata read first; a torn header or wrong key fails here
  // before the full scan runs.
  let _version: i64 = conn.pragma_query_value(None, "schema_version", |row| row.get(0))?;

  let check: String = conn.pragma_query_value(None, "integrity_check", |row| row.get(0))?;
  if check != "ok" {
    return Err(BackupError::IntegrityFailure(check));
  }
  Ok(())
}
