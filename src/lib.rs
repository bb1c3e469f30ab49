//! Backup and restore engine for the Rollbook desktop database.
//!
//! The live application database is a single SQLite file (plus WAL/SHM
//! side-files) inside the application's private data directory. This crate
//! owns everything about copying that file safely: engine-consistent hot
//! copies, structural verification before a copy is trusted, atomic
//! promotion into the backup directory, a retention policy that never
//! strands the installation with zero backups, and the restore path that
//! swaps a chosen snapshot back in and hands control to the application
//! lifecycle manager for a restart.
//!
//! The UI/IPC layer, the encryption-key provider, and the lifecycle manager
//! stay outside the crate; they are reached through the capability traits
//! in [`db`].

pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod paths;
pub mod restore;
pub mod retention;
pub mod scheduler;
pub mod service;
pub mod swap;
pub mod types;
pub mod verify;

pub use config::BackupConfig;
pub use db::{AppLifecycle, LiveDatabase, SecretProvider, SqliteLiveDatabase};
pub use error::{BackupError, Result};
pub use restore::RestoreStage;
pub use scheduler::BackupScheduler;
pub use service::BackupService;
pub use types::{BackupOutcome, BackupRecord};
