use crate::backup::catalog::{newest_first, scan_candidates, BackupKind, Candidate};
use crate::backup::compress::DeflateConfig;
use crate::backup::copier::delete_tree;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::{convert_error_vec, Result};
use crate::backup::result_error::WithMsg;
use crate::backup::validate::validate_dir_exist_or_created;
use bon::Builder;
use getset::{CopyGetters, Getters};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

pub static DEFAULT_MAX_COUNT: usize = 10;

fn default_max_count() -> usize {
    DEFAULT_MAX_COUNT
}

fn default_compress() -> bool {
    true
}

/// Where backups go, how many to keep and whether to compress them
///
/// Owned by the caller and passed into every operation; never mutated here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate, Builder, Getters, CopyGetters)]
#[serde(deny_unknown_fields)]
pub struct RetentionPolicy {
    #[validate(custom(function = validate_dir_exist_or_created))]
    #[builder(into)]
    #[getset(get = "pub")]
    backup_root: PathBuf,
    /// Backups kept per target and per family
    #[validate(range(min = 1))]
    #[serde(default = "default_max_count")]
    #[builder(default = DEFAULT_MAX_COUNT)]
    #[getset(get_copy = "pub")]
    max_count: usize,
    #[serde(default = "default_compress")]
    #[builder(default = true)]
    #[getset(get_copy = "pub")]
    compress: bool,
    #[validate(nested)]
    #[serde(default)]
    #[builder(default)]
    #[getset(get = "pub")]
    deflate: DeflateConfig,
}

impl RetentionPolicy {
    pub fn backup_dir_for(&self, backup_folder_name: &str) -> PathBuf {
        self.backup_root.join(backup_folder_name)
    }
}

/// Deletes every backup in `backup_dir` beyond the newest `max_count` of its family.
///
/// Archives and directories are capped separately, so a directory that has seen
/// both compression settings can hold up to `2 * max_count` backups. Every
/// deletion is attempted even if an earlier one fails; the deleted paths are
/// returned.
pub fn prune<P: AsRef<Path>>(backup_dir: P, max_count: usize) -> Result<Vec<PathBuf>> {
    let backup_dir = backup_dir.as_ref();
    if max_count == 0 {
        return Err(Error::invalid_input("max_count must be at least 1"));
    }

    let candidates = scan_candidates(backup_dir)?;
    let (archives, dirs): (Vec<Candidate>, Vec<Candidate>) = candidates
        .into_iter()
        .partition(|c| c.kind == BackupKind::Archive);

    let (deleted, errors): (Vec<_>, Vec<_>) = [archives, dirs]
        .into_iter()
        .flat_map(|family| newest_first(family).into_iter().skip(max_count))
        .map(|expired| {
            tracing::info!(
                "Removing out of retention {} backup {:?}",
                expired.kind,
                expired.path
            );
            delete_tree(&expired.path)
                .with_msg(format!("Removing {:?} failed", expired.path))
                .map(|_| expired.path)
        })
        .partition_result();

    for e in &errors {
        tracing::warn!("{e}");
    }
    convert_error_vec(errors)?;
    Ok(deleted.into_iter().collect_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::result_error::error::ErrorKind;
    use std::thread::sleep;
    use std::time::Duration;
    use tempfile::TempDir;

    fn pause() {
        sleep(Duration::from_millis(30));
    }

    fn names(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .sorted()
            .collect()
    }

    #[test]
    fn test_keeps_newest_directories() {
        let tmp = TempDir::new().unwrap();
        for i in 1..=5 {
            let d = tmp.path().join(format!("g_backup_{i}"));
            std::fs::create_dir(&d).unwrap();
            std::fs::write(d.join("save.dat"), format!("{i}")).unwrap();
            pause();
        }

        let deleted = prune(tmp.path(), 3).unwrap();

        assert_eq!(deleted.len(), 2);
        assert_eq!(names(tmp.path()), vec!["g_backup_3", "g_backup_4", "g_backup_5"]);
    }

    #[test]
    fn test_keeps_newest_archives() {
        let tmp = TempDir::new().unwrap();
        for i in 1..=5 {
            std::fs::write(tmp.path().join(format!("backup_{i}.zip")), format!("BACKUP {i}")).unwrap();
            pause();
        }

        prune(tmp.path(), 3).unwrap();

        assert_eq!(
            names(tmp.path()),
            vec!["backup_3.zip", "backup_4.zip", "backup_5.zip"]
        );
    }

    #[test]
    fn test_families_are_capped_independently() {
        let tmp = TempDir::new().unwrap();
        for i in 1..=3 {
            std::fs::write(tmp.path().join(format!("a_{i}.zip")), b"z").unwrap();
            std::fs::create_dir(tmp.path().join(format!("d_{i}"))).unwrap();
            pause();
        }

        prune(tmp.path(), 2).unwrap();

        assert_eq!(names(tmp.path()), vec!["a_2.zip", "a_3.zip", "d_2", "d_3"]);
    }

    #[test]
    fn test_under_limit_deletes_nothing() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("only")).unwrap();
        assert!(prune(tmp.path(), 1).unwrap().is_empty());
        assert_eq!(names(tmp.path()), vec!["only"]);
    }

    #[test]
    fn test_hidden_dirs_and_stray_files_survive() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join(".keep")).unwrap();
        std::fs::write(tmp.path().join("readme.txt"), b"r").unwrap();
        pause();
        std::fs::create_dir(tmp.path().join("b1")).unwrap();
        pause();
        std::fs::create_dir(tmp.path().join("b2")).unwrap();

        prune(tmp.path(), 1).unwrap();

        assert_eq!(names(tmp.path()), vec![".keep", "b2", "readme.txt"]);
    }

    #[test]
    fn test_missing_dir_is_noop() {
        let tmp = TempDir::new().unwrap();
        assert!(prune(tmp.path().join("missing"), 3).unwrap().is_empty());
    }

    #[test]
    fn test_zero_max_count_is_rejected() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("b1")).unwrap();
        let err = prune(tmp.path(), 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(names(tmp.path()), vec!["b1"]);
    }

    #[test]
    fn test_policy_defaults_and_validation() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        let policy = RetentionPolicy::builder().backup_root(&root).build();
        assert_eq!(policy.max_count(), 10);
        assert!(policy.compress());
        assert_eq!(policy.deflate().level(), 9);
        assert!(policy.validate().is_ok());
        assert!(root.is_dir());

        let zero = RetentionPolicy::builder()
            .backup_root(&root)
            .max_count(0)
            .build();
        assert!(zero.validate().is_err());

        let bad_level = RetentionPolicy::builder()
            .backup_root(&root)
            .deflate(DeflateConfig::with_level(12))
            .build();
        assert!(bad_level.validate().is_err());
    }

    #[test]
    fn test_policy_deserialize_defaults() {
        let policy: RetentionPolicy = serde_yml::from_str("backup_root: /tmp/backups\n").unwrap();
        assert_eq!(policy.backup_root(), &PathBuf::from("/tmp/backups"));
        assert_eq!(policy.max_count(), 10);
        assert!(policy.compress());
        assert_eq!(policy.backup_dir_for("g"), PathBuf::from("/tmp/backups/g"));
    }
}
