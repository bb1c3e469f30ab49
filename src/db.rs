//! Capability interfaces for the live database and its surroundings.
//!
//! The engine never imports an application-global handle. Callers hand it
//! these narrow capabilities at construction, which also makes every
//! component substitutable in tests.

use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::backup::Backup;
use rusqlite::Connection;

use crate::error::{BackupError, Result};

/// Narrow view of the live database needed by backup and restore.
pub trait LiveDatabase: Send + Sync {
  /// Whether a live connection is currently open.
  fn is_open(&self) -> bool;

  /// Path of the live database file.
  fn path(&self) -> PathBuf;

  /// Engine-consistent copy of the live database into `dest`.
  ///
  /// Must be safe to call while the database is open and in use.
  fn backup_to(&self, dest: &Path) -> Result<()>;

  /// Close the live connection and release its file locks.
  fn close(&self);
}

/// Source of the secret used to open the encrypted database.
pub trait SecretProvider: Send + Sync {
  /// Current encryption secret. Errors when the key store is unavailable.
  fn encryption_secret(&self) -> Result<String>;
}

/// Hook into the application lifecycle manager.
pub trait AppLifecycle: Send + Sync {
  /// Ask for a fresh process after a restore has swapped the database file.
  fn relaunch(&self);

  /// End this process with `code`.
  fn exit(&self, code: i32);
}

/// Pages copied per backup step before yielding to writers.
const BACKUP_PAGES_PER_STEP: std::ffi::c_int = 1000;

/// Pause between backup steps so writers are not starved.
const BACKUP_STEP_PAUSE: Duration = Duration::from_millis(10);

/// [`LiveDatabase`] backed by a rusqlite connection slot.
pub struct SqliteLiveDatabase {
  path: PathBuf,
  conn: Mutex<Option<Connection>>,
}

impl SqliteLiveDatabase {
  /// Open the database at `path` and wrap it in a capability handle.
  pub fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref().to_path_buf();
    let conn = Connection::open(&path)?;
    Ok(Self {
      path,
      conn: Mutex::new(Some(conn)),
    })
  }

  /// Wrap a connection the application already opened.
  pub fn from_connection(path: impl AsRef<Path>, conn: Connection) -> Self {
    Self {
      path: path.as_ref().to_path_buf(),
      conn: Mutex::new(Some(conn)),
    }
  }
}

impl LiveDatabase for SqliteLiveDatabase {
  fn is_open(&self) -> bool {
    self.conn.lock().is_some()
  }

  fn path(&self) -> PathBuf {
    self.path.clone()
  }

  fn backup_to(&self, dest: &Path) -> Result<()> {
    let guard = self.conn.lock();
    let conn = guard.as_ref().ok_or(BackupError::NotInitialized)?;
    let mut dest_conn = Connection::open(dest)?;
    let backup = Backup::new(conn, &mut dest_conn)?;
    backup.run_to_completion(BACKUP_PAGES_PER_STEP, BACKUP_STEP_PAUSE, None)?;
    Ok(())
  }

  fn close(&self) {
    // Dropping the connection releases the engine's file locks.
    self.conn.lock().take();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn seeded_db(path: &Path) -> SqliteLiveDatabase {
    let conn = Connection::open(path).expect("open live db");
    conn
      .execute_batch(
        "CREATE TABLE students (id INTEGER PRIMARY KEY, name TEXT);
         INSERT INTO students (name) VALUES ('ada'), ('grace');",
      )
      .expect("seed live db");
    SqliteLiveDatabase::from_connection(path, conn)
  }

  #[test]
  fn backup_to_copies_a_usable_database() {
    let dir = tempfile::tempdir().expect("tempdir");
    let live_path = dir.path().join("rollbook.sqlite");
    let copy_path = dir.path().join("copy.sqlite");

    let live = seeded_db(&live_path);
    live.backup_to(&copy_path).expect("backup copy");

    let copy = Connection::open(&copy_path).expect("open copy");
    let count: i64 = copy
      .query_row("SELECT COUNT(*) FROM students", [], |row| row.get(0))
      .expect("count rows");
    assert_eq!(count, 2);
  }

  #[test]
  fn close_releases_the_connection_slot() {
    let dir = tempfile::tempdir().expect("tempdir");
    let live = seeded_db(&dir.path().join("rollbook.sqlite"));

    assert!(live.is_open());
    live.close();
    assert!(!live.is_open());

    let err = live
      .backup_to(&dir.path().join("copy.sqlite"))
      .expect_err("backup after close must fail");
    assert!(matches!(err, BackupError::NotInitialized));
  }
}
