//! Background schedule keeping a fresh backup on disk.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::constants::AUTO_LABEL;
use crate::service::BackupService;

/// Periodic check that a backup exists and is younger than the staleness
/// threshold.
///
/// One tick's work settles before the next is scheduled, so at most one
/// scheduled backup is ever in flight. The handle is owned by whoever owns
/// the service value; dropping the scheduler stops the schedule.
pub struct BackupScheduler {
  handle: JoinHandle<()>,
}

impl BackupScheduler {
  /// Spawn the schedule on the current tokio runtime.
  pub fn start(service: Arc<BackupService>) -> Self {
    let handle = tokio::spawn(async move {
      let mut ticker = time::interval(service.config.tick_interval);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
      // interval() fires immediately; consume that tick so startup work
      // does not race application initialization.
      ticker.tick().await;
      loop {
        ticker.tick().await;
        run_tick(&service).await;
      }
    });
    Self { handle }
  }

  /// Stop the schedule. A backup already running on the blocking pool is
  /// not interrupted.
  pub fn stop(&self) {
    self.handle.abort();
  }
}

impl Drop for BackupScheduler {
  fn drop(&mut self) {
    self.handle.abort();
  }
}

/// One schedule tick. Never propagates an error; the timer always fires
/// again on cadence.
async fn run_tick(service: &BackupService) {
  if !due_for_backup(service) {
    debug!("scheduled backup not due");
    return;
  }
  let outcome = service.create_backup(AUTO_LABEL).await;
  if outcome.success {
    info!(path = ?outcome.path, "scheduled backup created");
  } else {
    error!(error = ?outcome.error, "scheduled backup failed");
  }
}

/// A backup is due when none exists or the newest is older than the
/// configured staleness threshold.
fn due_for_backup(service: &BackupService) -> bool {
  let records = service.list_backups();
  match records.first() {
    None => true,
    Some(newest) => {
      match chrono::Utc::now()
        .signed_duration_since(newest.created_at)
        .to_std()
      {
        Ok(age) => age >= service.config.stale_after,
        // Future-dated backups count as fresh.
        Err(_) => false,
      }
    }
  }
}
