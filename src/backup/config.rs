use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use crate::backup::retention::RetentionPolicy;
use crate::backup::target::BackupTarget;
use getset::{CopyGetters, Getters};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fs::File;
use std::path::Path;
use validator::{Validate, ValidationError};

/// Contents of the YAML file the binary is started with
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, Validate, Getters, CopyGetters)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = validate_unique_folders))]
pub struct AppConfig {
    #[validate(nested)]
    #[getset(get = "pub")]
    retention: RetentionPolicy,
    #[validate(nested)]
    #[serde(default)]
    #[getset(get = "pub")]
    targets: Vec<BackupTarget>,
    /// Size of the worker pool, defaults to one thread per core
    #[validate(range(min = 1))]
    #[getset(get_copy = "pub")]
    worker_threads: Option<usize>,
}

fn validate_unique_folders(config: &AppConfig) -> std::result::Result<(), ValidationError> {
    let duplicates = config
        .targets
        .iter()
        .map(BackupTarget::folder_name)
        .duplicates()
        .collect_vec();
    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new("DuplicateFolderName").with_message(
            format!("Targets share backup folders: {}", duplicates.join(", ")).into(),
        ))
    }
}

impl AppConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        File::open(path)
            .map_err(Error::from)
            .and_then(|f| {
                serde_yml::from_reader::<_, AppConfig>(f)
                    .map_err(Error::from)
                    .with_msg(format!("Parse YAML config failed: {:?}", path))
            })
            .and_then(|config| {
                config
                    .validate()
                    .map_err(Error::from)
                    .map(|_| config)
                    .with_msg(format!("Config validation failed: {:?}", path))
            })
    }

    /// Looks a target up by title or backup folder name, ignoring case.
    pub fn find_target(&self, name: &str) -> Result<&BackupTarget> {
        self.targets
            .iter()
            .find(|t| t.title().eq_ignore_ascii_case(name) || t.folder_name() == name)
            .ok_or_else(|| Error::not_found(format!("No target named {name:?} in config")))
    }
}
