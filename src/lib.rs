//! # save-vault
//!
//! Point-in-time backups of game save directories, with retention and safe restore.
//!
//! ## Features
//!
//! - **Two backup formats**: deflate-compressed zip archives or plain directory copies
//! - **Retention**: keeps the newest N backups per target, archives and directories counted separately
//! - **Safe restore**: the current saves are backed up before a restore replaces them
//! - **Worker pool**: calls run off the caller's thread, serialized per target
//!
//! ## Quick Start
//!
//! ```no_run
//! use save_vault::backup::retention::RetentionPolicy;
//! use save_vault::backup::service::BackupService;
//! use save_vault::backup::target::BackupTarget;
//!
//! let target = BackupTarget::builder()
//!     .title("Elden Ring")
//!     .source_path("/home/me/.local/share/EldenRing")
//!     .build();
//! let policy = RetentionPolicy::builder()
//!     .backup_root("/home/me/GameBackups")
//!     .max_count(5)
//!     .build();
//!
//! let outcome = BackupService::new().create_backup(&target, &policy);
//! println!("{}", outcome.message());
//! ```

pub mod backup;
