//! Recursive copy and delete of directory trees.

use crate::backup::function_path;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{WithDebugObjectAndFnName, WithMsg};
use function_name::named;
use std::io::ErrorKind;
use std::path::Path;
use walkdir::WalkDir;

/// Copies every file and directory under `src` into `dst`, creating `dst` if needed.
///
/// Files already present at the same relative path are overwritten; other
/// files in `dst` are left alone. Links are followed. Returns the number of
/// bytes copied.
#[named]
pub fn copy_tree<P1: AsRef<Path>, P2: AsRef<Path>>(src: P1, dst: P2) -> Result<u64> {
    let src = src.as_ref();
    let dst = dst.as_ref();
    if !src.is_dir() {
        return Err(Error::invalid_input(format!(
            "Source directory does not exist: {:?}",
            src
        )));
    }
    if dst.starts_with(src) {
        return Err(Error::invalid_input(format!(
            "Cannot copy {:?} into itself ({:?})",
            src, dst
        )));
    }

    (|| -> Result<u64> {
        std::fs::create_dir_all(dst)?;
        let mut bytes = 0;
        for entry in WalkDir::new(src).follow_links(true).min_depth(1) {
            let entry = entry?;
            let target = dst.join(entry.path().strip_prefix(src)?);
            if entry.file_type().is_dir() {
                std::fs::create_dir_all(&target)?;
            } else {
                bytes += std::fs::copy(entry.path(), &target)
                    .map_err(Error::from)
                    .with_msg(format!("Copying {:?} to {:?}", entry.path(), target))?;
            }
        }
        tracing::debug!("Copied {} bytes from {:?} to {:?}", bytes, src, dst);
        Ok(bytes)
    })()
    .with_debug_object_and_fn_name(src.to_path_buf(), function_path!())
}

/// Removes `path` and everything below it. A missing path is not an error.
#[named]
pub fn delete_tree<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    let res = if metadata.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    res.map_err(Error::from)
        .with_debug_object_and_fn_name(path.to_path_buf(), function_path!())?;
    tracing::debug!("Deleted {:?}", path);
    Ok(())
}

/// File length for a file, recursive sum of file lengths for a directory, 0 when missing.
pub fn path_size<P: AsRef<Path>>(path: P) -> Result<u64> {
    let path = path.as_ref();
    if path.is_file() {
        return Ok(path.metadata()?.len());
    }
    if !path.is_dir() {
        return Ok(0);
    }

    let mut total = 0;
    for entry in WalkDir::new(path).follow_links(true) {
        let entry = entry?;
        if entry.file_type().is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}
