//! Retention policy for the backup directory.
//!
//! Two pressures act on the backup set after every successful backup: a
//! rolling count keeps the newest `max_backups` recent files, and an age
//! cutoff thins everything older down to one survivor per bucket. Older
//! buckets are 30-day-wide windows indexed by `age / age_bucket`, not
//! calendar months. Whatever the pressures compute, the newest backup is
//! never deleted.

use std::collections::HashSet;
use std::fs;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::BackupConfig;
use crate::paths::BackupPaths;
use crate::types::BackupRecord;

/// Select the filenames to delete. `records` must be sorted newest-first.
pub fn select_deletions(
  records: &[BackupRecord],
  now: DateTime<Utc>,
  config: &BackupConfig,
) -> Vec<String> {
  let mut doomed: Vec<usize> = Vec::new();
  let mut seen_buckets: HashSet<i64> = HashSet::new();
  let mut recent_kept = 0usize;

  for (idx, record) in records.iter().enumerate() {
    let age = match now.signed_duration_since(record.created_at).to_std() {
      Ok(age) => age,
      // Future-dated records count as brand new.
      Err(_) => std::time::Duration::ZERO,
    };

    if age > config.max_age {
      // Newest-first order means the first record seen in a bucket is that
      // bucket's survivor.
      let bucket = (age.as_secs() / config.age_bucket.as_secs().max(1)) as i64;
      if !seen_buckets.insert(bucket) {
        doomed.push(idx);
      }
    } else {
      recent_kept += 1;
      if recent_kept > config.max_backups {
        doomed.push(idx);
      }
    }
  }

  // Retention must never leave zero backups when at least one existed.
  if !records.is_empty() && doomed.len() == records.len() {
    doomed.retain(|&idx| idx != 0);
  }

  doomed
    .into_iter()
    .map(|idx| records[idx].filename.clone())
    .collect()
}

/// Apply the policy: delete each candidate independently, best-effort. A
/// failed deletion is logged and never aborts the rest.
pub fn apply(
  paths: &BackupPaths,
  records: &[BackupRecord],
  now: DateTime<Utc>,
  config: &BackupConfig,
) {
  for filename in select_deletions(records, now, config) {
    let path = paths.backup_dir().join(&filename);
    match fs::remove_file(&path) {
      Ok(()) => info!(file = %filename, "retention removed backup"),
      Err(error) => warn!(file = %filename, %error, "retention failed to remove backup"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;

  fn record(name: &str, age_days: i64, now: DateTime<Utc>) -> BackupRecord {
    BackupRecord {
      filename: name.to_string(),
      size_bytes: 4096,
      created_at: now - Duration::days(age_days),
    }
  }

  fn config() -> BackupConfig {
    BackupConfig::new("/data")
  }

  #[test]
  fn daily_set_with_older_buckets_keeps_one_survivor_per_bucket() {
    let now = Utc::now();
    let mut records: Vec<BackupRecord> = (0..7)
      .map(|day| record(&format!("backup-auto-day{day}.sqlite"), day, now))
      .collect();
    records.push(record("backup-auto-40d.sqlite", 40, now));
    records.push(record("backup-auto-45d.sqlite", 45, now));
    records.push(record("backup-auto-75d.sqlite", 75, now));

    let doomed = select_deletions(&records, now, &config());

    // 40d supersedes 45d inside their shared bucket; 75d survives alone in
    // its own bucket; the seven daily backups are untouched.
    assert_eq!(doomed, vec!["backup-auto-45d.sqlite".to_string()]);
  }

  #[test]
  fn rolling_count_trims_recent_backups_beyond_the_limit() {
    let now = Utc::now();
    let records: Vec<BackupRecord> = (0..10)
      .map(|day| record(&format!("backup-auto-day{day}.sqlite"), day, now))
      .collect();

    let doomed = select_deletions(&records, now, &config());

    assert_eq!(
      doomed,
      vec![
        "backup-auto-day7.sqlite".to_string(),
        "backup-auto-day8.sqlite".to_string(),
        "backup-auto-day9.sqlite".to_string(),
      ]
    );
  }

  #[test]
  fn the_newest_backup_always_survives() {
    let now = Utc::now();
    let records = vec![
      record("backup-auto-newest.sqlite", 0, now),
      record("backup-auto-older.sqlite", 1, now),
    ];
    let mut zero_kept = config();
    zero_kept.max_backups = 0;

    let doomed = select_deletions(&records, now, &zero_kept);

    assert_eq!(doomed, vec!["backup-auto-older.sqlite".to_string()]);
  }

  #[test]
  fn an_empty_set_selects_nothing() {
    assert!(select_deletions(&[], Utc::now(), &config()).is_empty());
  }

  #[test]
  fn apply_survives_a_missing_candidate_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = BackupPaths::new(dir.path());
    let now = Utc::now();

    let kept = dir.path().join("backup-auto-day0.sqlite");
    std::fs::write(&kept, b"keep").expect("write kept");
    let survivor = dir.path().join("backup-auto-40d.sqlite");
    std::fs::write(&survivor, b"survivor").expect("write survivor");
    let doomed_on_disk = dir.path().join("backup-auto-50d.sqlite");
    std::fs::write(&doomed_on_disk, b"doomed").expect("write doomed");

    // Bucket 1 holds 40d, 45d, and 50d; 40d survives as bucket-newest.
    // 45d never existed on disk; failing to delete it must not stop the
    // deletion of 50d, which does.
    let records = vec![
      record("backup-auto-day0.sqlite", 0, now),
      record("backup-auto-40d.sqlite", 40, now),
      record("backup-auto-45d.sqlite", 45, now),
      record("backup-auto-50d.sqlite", 50, now),
    ];

    apply(&paths, &records, now, &config());

    assert!(kept.exists());
    assert!(survivor.exists(), "bucket survivor must be kept");
    assert!(!doomed_on_disk.exists(), "bucket loser must be deleted");
  }
}
