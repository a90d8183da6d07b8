//! Create, list and restore backups for a target.
//!
//! This is the only layer that turns [`Error`] into a [`BackupOutcome`]; every
//! module below it reports failures through [`Result`].

use crate::backup::archive::{archive_dir, unarchive};
use crate::backup::catalog::{list_backups, BackupEntry, BackupKind};
use crate::backup::copier::{copy_tree, delete_tree, path_size};
use crate::backup::file_ext::{has_archive_ext, ARCHIVE_FILE_EXT};
use crate::backup::result_error::error::{Error, ErrorKind};
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use crate::backup::retention::{prune, RetentionPolicy};
use crate::backup::target::BackupTarget;
use chrono::{DateTime, Local};
use getset::{CopyGetters, Getters};
use serde::Serialize;
use serde_with::skip_serializing_none;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use validator::Validate;

pub static MSG_NOT_INSTALLED: &str = "Game is not installed";
pub static MSG_SAVE_PATH_MISSING: &str = "Save path does not exist";
pub static MSG_BACKUP_NOT_FOUND: &str = "Backup file not found";
pub static MSG_BACKUP_CREATED: &str = "Backup created successfully";
pub static MSG_BACKUP_RESTORED: &str = "Backup restored successfully";

/// Result of a create or restore call. Failures are values, not errors.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Getters, CopyGetters)]
pub struct BackupOutcome {
    #[getset(get_copy = "pub")]
    success: bool,
    #[getset(get = "pub")]
    message: String,
    /// Set iff `success`
    #[getset(get = "pub")]
    result_path: Option<PathBuf>,
    /// Set iff `success`
    #[getset(get_copy = "pub")]
    size_bytes: Option<u64>,
    /// Set iff not `success`
    #[getset(get_copy = "pub")]
    error_kind: Option<ErrorKind>,
}

impl BackupOutcome {
    fn succeeded<S: Into<String>>(message: S, result_path: PathBuf, size_bytes: u64) -> Self {
        Self {
            success: true,
            message: message.into(),
            result_path: Some(result_path),
            size_bytes: Some(size_bytes),
            error_kind: None,
        }
    }

    fn failed(error: &Error) -> Self {
        Self {
            success: false,
            message: error.root_message(),
            result_path: None,
            size_bytes: None,
            error_kind: Some(error.kind()),
        }
    }
}

/// Backup and restore of save directories.
///
/// Holds no state between calls; the policy travels with every call. Calls on
/// the same target must not overlap, see [`crate::backup::worker::BackupWorker`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BackupService;

impl BackupService {
    pub fn new() -> Self {
        Self
    }

    pub fn create_backup(&self, target: &BackupTarget, policy: &RetentionPolicy) -> BackupOutcome {
        self.create_backup_at(target, policy, Local::now())
    }

    /// Creates a backup named after `now`, then prunes the target's backup folder.
    pub fn create_backup_at(
        &self,
        target: &BackupTarget,
        policy: &RetentionPolicy,
        now: DateTime<Local>,
    ) -> BackupOutcome {
        let res = self
            .write_backup(target, policy, now, None)
            .and_then(|path| {
                prune(path_parent(&path)?, policy.max_count())?;
                Ok(path)
            })
            .and_then(|path| {
                let size = path_size(&path)?;
                Ok((path, size))
            });

        match res {
            Ok((path, size)) => {
                info!("Created backup {:?} ({} bytes) for {}", path, size, target.title());
                BackupOutcome::succeeded(MSG_BACKUP_CREATED, path, size)
            }
            Err(e) => {
                error!("Error creating backup for {}: {e}", target.title());
                BackupOutcome::failed(&e)
            }
        }
    }

    pub fn list_backups(
        &self,
        target: &BackupTarget,
        policy: &RetentionPolicy,
    ) -> Result<Vec<BackupEntry>> {
        list_backups(policy.backup_dir_for(&target.folder_name()))
    }

    /// Applies the policy's retention to the target's backup folder on demand.
    pub fn prune_backups(
        &self,
        target: &BackupTarget,
        policy: &RetentionPolicy,
    ) -> Result<Vec<PathBuf>> {
        policy.validate()?;
        prune(
            policy.backup_dir_for(&target.folder_name()),
            policy.max_count(),
        )
    }

    pub fn restore_backup<P: AsRef<Path>>(
        &self,
        target: &BackupTarget,
        backup_path: P,
        policy: &RetentionPolicy,
    ) -> BackupOutcome {
        self.restore_backup_at(target, backup_path, policy, Local::now())
    }

    /// Replaces the target's source directory with the backup at `backup_path`.
    ///
    /// The current state is backed up first. When that safety backup fails the
    /// restore still goes ahead. Retention runs after the restore, so the backup
    /// being restored is never pruned away underneath it.
    pub fn restore_backup_at<P: AsRef<Path>>(
        &self,
        target: &BackupTarget,
        backup_path: P,
        policy: &RetentionPolicy,
        now: DateTime<Local>,
    ) -> BackupOutcome {
        let backup_path = backup_path.as_ref();
        if !backup_path.exists() {
            return BackupOutcome::failed(&Error::not_found(MSG_BACKUP_NOT_FOUND));
        }

        match self.write_backup(target, policy, now, Some(backup_path)) {
            Ok(path) => info!("Saved current state of {} to {:?}", target.title(), path),
            Err(e) => warn!(
                "Failed to create current saves backup before restore of {}: {e}",
                target.title()
            ),
        }

        let res = self.write_restore(target, backup_path).and_then(|_| {
            let size = path_size(backup_path)?;
            Ok(size)
        });

        match res {
            Ok(size) => {
                let backup_dir = policy.backup_dir_for(&target.folder_name());
                if let Err(e) = prune(&backup_dir, policy.max_count()) {
                    warn!("Retention after restore failed for {:?}: {e}", backup_dir);
                }
                info!("Restored {:?} into {:?}", backup_path, target.source_path());
                BackupOutcome::succeeded(MSG_BACKUP_RESTORED, backup_path.to_path_buf(), size)
            }
            Err(e) => {
                error!("Error restoring backup for {}: {e}", target.title());
                BackupOutcome::failed(&e)
            }
        }
    }

    /// Writes a backup of the target's current state and returns its path.
    ///
    /// `protect` is a path that must not be overwritten by the new backup.
    fn write_backup(
        &self,
        target: &BackupTarget,
        policy: &RetentionPolicy,
        now: DateTime<Local>,
        protect: Option<&Path>,
    ) -> Result<PathBuf> {
        if !target.installed() {
            return Err(Error::invalid_input(MSG_NOT_INSTALLED));
        }
        let source = target.source_path();
        if !source.is_dir() {
            return Err(Error::invalid_input(MSG_SAVE_PATH_MISSING));
        }
        policy.validate()?;

        let backup_dir = policy.backup_dir_for(&target.folder_name());
        std::fs::create_dir_all(&backup_dir)
            .map_err(Error::from)
            .with_msg(format!("Creating backup directory {:?}", backup_dir))?;

        let kind = if policy.compress() {
            BackupKind::Archive
        } else {
            BackupKind::Directory
        };
        let dest = backup_dir.join(target.backup_file_name(&now, &kind));
        if protect.is_some_and(|p| same_path(p, &dest)) {
            return Err(Error::invalid_input(format!(
                "{:?} is the backup being restored",
                dest
            )));
        }

        match kind {
            BackupKind::Archive => archive_dir(source, &dest, policy.deflate())?,
            BackupKind::Directory => {
                delete_tree(&dest)?;
                copy_tree(source, &dest)?;
            }
        }
        Ok(dest)
    }

    fn write_restore(&self, target: &BackupTarget, backup_path: &Path) -> Result<()> {
        let source = target.source_path();
        if backup_path.starts_with(source) {
            return Err(Error::invalid_input(format!(
                "Backup {:?} lies inside the save path {:?}",
                backup_path, source
            )));
        }

        if has_archive_ext(backup_path) {
            unarchive(backup_path, source)
        } else {
            if !backup_path.is_dir() {
                return Err(Error::invalid_input(format!(
                    "Backup {:?} is neither a {} archive nor a directory",
                    backup_path, ARCHIVE_FILE_EXT
                )));
            }
            delete_tree(source)?;
            copy_tree(backup_path, source).map(|_| ())
        }
    }
}

/// Compares resolved paths when both exist, the literal paths otherwise.
fn same_path(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn path_parent(path: &Path) -> Result<&Path> {
    path.parent()
        .ok_or_else(|| Error::invalid_input(format!("{:?} has no parent", path)))
}
