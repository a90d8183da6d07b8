//! Listing of the backups stored for one target.
//!
//! Nothing is persisted: every call rebuilds the listing from the backup
//! directory's immediate children.

use crate::backup::copier::path_size;
use crate::backup::file_ext::{has_archive_ext, FileExtProvider, ARCHIVE_FILE_EXT};
use crate::backup::result_error::result::Result;
use chrono::{DateTime, Local};
use derive_more::Display;
use getset::{CopyGetters, Getters};
use itertools::Itertools;
use serde::Serialize;
use std::cmp::Reverse;
use std::fs::{read_dir, Metadata};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub static DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The two families of backups, pruned independently of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupKind {
    #[display("archive")]
    Archive,
    #[display("directory")]
    Directory,
}

impl FileExtProvider for BackupKind {
    fn file_ext(&self) -> Option<Arc<str>> {
        match self {
            BackupKind::Archive => Some(ARCHIVE_FILE_EXT.into()),
            BackupKind::Directory => None,
        }
    }
}

/// A backup found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Getters, CopyGetters)]
pub struct BackupEntry {
    #[getset(get = "pub")]
    name: String,
    #[getset(get = "pub")]
    path: PathBuf,
    /// Filesystem creation time, falling back to modification time where the
    /// platform does not record one.
    #[getset(get_copy = "pub")]
    creation_time: DateTime<Local>,
    #[getset(get_copy = "pub")]
    size_bytes: u64,
    #[getset(get_copy = "pub")]
    is_compressed: bool,
}

impl BackupEntry {
    pub fn kind(&self) -> BackupKind {
        if self.is_compressed {
            BackupKind::Archive
        } else {
            BackupKind::Directory
        }
    }

    pub fn formatted_date(&self) -> String {
        self.creation_time.format(DATE_FORMAT).to_string()
    }

    pub fn formatted_size(&self) -> String {
        format_size(self.size_bytes)
    }
}

/// Human readable size in 1024-based units, at most two decimals.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 B".to_string();
    }

    let (unit_idx, scale) = (0..UNITS.len())
        .rev()
        .map(|i| (i, 1024u64.pow(i as u32)))
        .find(|(_, scale)| bytes >= *scale)
        .unwrap_or((0, 1));
    let value = format!("{:.2}", bytes as f64 / scale as f64);
    let value = value.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", value, UNITS[unit_idx])
}

/// An immediate child of a backup directory that counts as a backup.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub path: PathBuf,
    pub kind: BackupKind,
    pub created: DateTime<Local>,
}

fn created_at(metadata: &Metadata) -> std::io::Result<DateTime<Local>> {
    metadata
        .created()
        .or_else(|_| metadata.modified())
        .map(DateTime::<Local>::from)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

/// Archive files first, then directories, each in enumeration order.
pub(crate) fn scan_candidates<P: AsRef<Path>>(backup_dir: P) -> Result<Vec<Candidate>> {
    let backup_dir = backup_dir.as_ref();
    if !backup_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut archives = Vec::new();
    let mut dirs = Vec::new();
    for entry in read_dir(backup_dir)? {
        let entry = entry?;
        let path = entry.path();
        let metadata = match std::fs::metadata(&path) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("Skipping unreadable {:?} in backup directory: {e}", path);
                continue;
            }
        };
        if metadata.is_file() && has_archive_ext(&path) {
            archives.push(Candidate {
                created: created_at(&metadata)?,
                path,
                kind: BackupKind::Archive,
            });
        } else if metadata.is_dir() && !is_hidden(&path) {
            dirs.push(Candidate {
                created: created_at(&metadata)?,
                path,
                kind: BackupKind::Directory,
            });
        } else {
            tracing::trace!("Ignoring {:?} in backup directory", path);
        }
    }

    archives.extend(dirs);
    Ok(archives)
}

/// Newest first. Equal timestamps keep enumeration order.
pub(crate) fn newest_first(candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates
        .into_iter()
        .sorted_by_key(|c| Reverse(c.created))
        .collect()
}

/// Lists every backup in `backup_dir`, newest first.
///
/// A missing directory lists as empty.
pub fn list_backups<P: AsRef<Path>>(backup_dir: P) -> Result<Vec<BackupEntry>> {
    newest_first(scan_candidates(backup_dir)?)
        .into_iter()
        .map(|c| {
            let name = match c.kind {
                BackupKind::Archive => c.path.file_stem(),
                BackupKind::Directory => c.path.file_name(),
            }
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
            Ok(BackupEntry {
                name,
                size_bytes: path_size(&c.path)?,
                is_compressed: c.kind == BackupKind::Archive,
                creation_time: c.created,
                path: c.path,
            })
        })
        .collect()
}
