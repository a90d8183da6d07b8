use crate::backup::file_ext::{with_file_ext, FileExtProvider};
use crate::backup::validate::validate_valid_folder_name;
use bon::Builder;
use chrono::{DateTime, TimeZone};
use getset::{CopyGetters, Getters};
use sanitize_filename::sanitize;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::PathBuf;
use validator::Validate;

static TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
static FALLBACK_FOLDER_NAME: &str = "game";

fn default_installed() -> bool {
    true
}

/// The directory tree to back up, and the name its backups are filed under
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate, Builder, Getters, CopyGetters)]
#[serde(deny_unknown_fields)]
pub struct BackupTarget {
    #[validate(length(min = 1))]
    #[builder(into)]
    #[getset(get = "pub")]
    title: String,
    /// Directory that is backed up and restored into
    #[builder(into)]
    #[getset(get = "pub")]
    source_path: PathBuf,
    /// Overrides the folder name derived from the title
    #[validate(custom(function = validate_valid_folder_name))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    backup_folder_name: Option<String>,
    /// Set by the catalog when the game itself could not be found
    #[serde(default = "default_installed")]
    #[builder(default = true)]
    #[getset(get_copy = "pub")]
    installed: bool,
}

impl BackupTarget {
    /// Sub-directory of the backup root holding this target's backups.
    ///
    /// Stable for a given title: lower-cased, spaces replaced by underscores,
    /// then stripped of characters no filesystem accepts.
    pub fn folder_name(&self) -> String {
        if let Some(name) = &self.backup_folder_name {
            return name.clone();
        }
        let derived = sanitize(self.title.replace(' ', "_").to_lowercase());
        if derived.trim().is_empty() {
            FALLBACK_FOLDER_NAME.to_string()
        } else {
            derived
        }
    }

    /// `{title}_backup_{yyyy-MM-dd_HH-mm-ss}`, plus the extension `ext` provides.
    pub fn backup_file_name<O: Display, T: TimeZone<Offset = O>, F: FileExtProvider + ?Sized>(
        &self,
        dt: &DateTime<T>,
        ext: &F,
    ) -> String {
        let base = format!(
            "{}_backup_{}",
            sanitize(&self.title),
            dt.format(TIME_FORMAT)
        );
        with_file_ext(ext, &base)
    }
}
