//! Crate-wide constants: naming, side-file suffixes, retention defaults.

use std::time::Duration;

/// Extension carried by every promoted backup file.
pub const BACKUP_EXT: &str = ".sqlite";

/// Prefix of every promoted backup filename.
pub const BACKUP_PREFIX: &str = "backup-";

/// Name of the backup directory under the application data directory.
pub const BACKUP_DIR_NAME: &str = "backups";

/// Write-ahead log side-file suffix, appended to the full database filename.
pub const WAL_SUFFIX: &str = "-wal";

/// Shared-memory index side-file suffix.
pub const SHM_SUFFIX: &str = "-shm";

/// Marker inserted before the timestamp of a rollback sidecar.
pub const PREVIOUS_MARKER: &str = ".previous-";

/// Rolling count of most-recent backups always kept by retention.
pub const MAX_BACKUPS: usize = 7;

/// Age cutoff beyond which only one backup per older bucket survives.
pub const MAX_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Width of one older-backup bucket.
pub const AGE_BUCKET: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Schedule tick cadence.
pub const TICK_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// A newest backup older than this is refreshed on the next tick.
pub const STALE_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

/// Label for schedule-initiated backups.
pub const AUTO_LABEL: &str = "auto";

/// Label for the safety backup taken before a restore.
pub const PRE_RESTORE_LABEL: &str = "pre-restore";

/// Free-space floor required on top of the size-derived estimate.
pub const FREE_SPACE_FLOOR: u64 = 20 * 1024 * 1024;

/// Required free space relative to the combined database + WAL size.
pub const FREE_SPACE_MULTIPLIER: u64 = 2;
