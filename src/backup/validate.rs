//! Validation functions for configuration values.
//!
//! Provides custom validation functions for backup folder names and
//! directories referenced by the configuration.

use sanitize_filename::{is_sanitized, sanitize};
use validator::ValidationError;

use std::path::Path;

pub fn validate_valid_folder_name<S: AsRef<str>>(name: S) -> Result<(), ValidationError> {
    let name = name.as_ref();
    if name.trim().is_empty() {
        return Err(ValidationError::new("InvalidFolderName")
            .with_message("Folder name must not be blank".into()));
    }

    if !is_sanitized(name) {
        return Err(ValidationError::new("InvalidFolderName").with_message(
            format!(
                "Invalid folder name, try sanitizing like {:?}",
                sanitize(name)
            )
            .into(),
        ));
    }

    Ok(())
}

pub fn validate_dir_exist_or_created<P: AsRef<Path>>(dir: P) -> Result<(), ValidationError> {
    let dir = dir.as_ref();
    if dir.exists() {
        if !dir.is_dir() {
            return Err(ValidationError::new("InvalidDirectory")
                .with_message(format!("{:?} is not a directory", dir).into()));
        }
    } else {
        return std::fs::create_dir_all(dir).map_err(|e| {
            ValidationError::new("InvalidDirectory").with_message(
                format!("cannot create or access backup root {:?}: {}", dir, e).into(),
            )
        });
    }

    Ok(())
}
