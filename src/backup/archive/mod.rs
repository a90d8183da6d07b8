//! Archive codec: packs a directory tree into a single zip file and unpacks it again.
//!
//! Entry names are relative to the archived directory, so the directory's own
//! name never appears inside the archive.

pub mod walk;

use crate::backup::archive::walk::WalkSource;
use crate::backup::compress::DeflateConfig;
use crate::backup::copier::delete_tree;
use crate::backup::function_path;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithDebugObjectAndFnName;
use function_name::named;
use std::fs::File;
use std::io::{BufReader, BufWriter, IntoInnerError, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use zip::{ZipArchive, ZipWriter};

/// A single file or directory to be written into an archive
#[derive(Debug)]
pub struct ArchiveEntry {
    /// Source path on the filesystem
    pub src: Arc<Path>,

    /// Path inside the archive, relative to the archived directory
    pub dst: Arc<Path>,

    pub is_dir: bool,
}

impl ArchiveEntry {
    pub fn file<A: Into<Arc<Path>>, B: Into<Arc<Path>>>(src: A, dst: B) -> ArchiveEntry {
        Self {
            src: src.into(),
            dst: dst.into(),
            is_dir: false,
        }
    }

    pub fn dir<A: Into<Arc<Path>>, B: Into<Arc<Path>>>(src: A, dst: B) -> ArchiveEntry {
        Self {
            src: src.into(),
            dst: dst.into(),
            is_dir: true,
        }
    }

    /// Forward-slash separated name as stored in the zip central directory.
    pub fn zip_name(&self) -> Result<String> {
        let mut parts = Vec::new();
        for component in self.dst.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str().ok_or_else(|| {
                    Error::invalid_input(format!("Non UTF-8 path {:?}", self.dst))
                })?),
                _ => {
                    return Err(Error::invalid_input(format!(
                        "Archive entry must be a plain relative path: {:?}",
                        self.dst
                    )))
                }
            }
        }
        let name = parts.join("/");
        Ok(if self.is_dir { format!("{name}/") } else { name })
    }
}

/// Writes every entry under `src_dir` into a new archive at `dest`.
///
/// An existing file at `dest` is replaced, never merged into. The archive is
/// written to a sibling `.tmp` file first and renamed once complete.
#[named]
pub fn archive_dir<P1: AsRef<Path>, P2: AsRef<Path>>(
    src_dir: P1,
    dest: P2,
    config: &DeflateConfig,
) -> Result<()> {
    let src_dir = src_dir.as_ref();
    let dest = dest.as_ref();
    if !src_dir.is_dir() {
        return Err(Error::invalid_input(format!(
            "Source directory does not exist: {:?}",
            src_dir
        )));
    }

    if dest.starts_with(src_dir) {
        return Err(Error::invalid_input(format!(
            "Cannot write archive {:?} inside the archived directory {:?}",
            dest, src_dir
        )));
    }

    if dest.exists() {
        tracing::debug!("Removing existing archive {:?}", dest);
        std::fs::remove_file(dest)?;
    }

    let tmp = tmp_path(dest);
    if tmp.exists() {
        tracing::warn!("Removing leftover temporary archive {:?}", tmp);
        std::fs::remove_file(&tmp)?;
    }
    let res = write_archive(src_dir, &tmp, config).and_then(|_| {
        std::fs::rename(&tmp, dest).map_err(Error::from)
    });

    res.map_err(|mut e| {
        if tmp.exists() {
            if let Err(e2) = std::fs::remove_file(&tmp) {
                e = e.chain(e2.into())
            }
        }
        e
    })
    .with_debug_object_and_fn_name(dest.to_path_buf(), function_path!())
}

fn tmp_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_archive(src_dir: &Path, tmp: &Path, config: &DeflateConfig) -> Result<()> {
    let mut writer = ZipWriter::new(BufWriter::new(File::create_new(tmp)?));

    let mut entry_count = 0;
    for entry in WalkSource::new(src_dir).archive_entry_iterator()? {
        let entry = entry?;
        let name = entry.zip_name()?;
        if entry.is_dir {
            writer.add_directory(name, config.dir_options())?;
        } else {
            let mut reader = BufReader::new(File::open(&entry.src)?);
            let len = reader.get_ref().metadata()?.len();
            writer.start_file(name, config.file_options(len))?;
            std::io::copy(&mut reader, &mut writer)?;
        }
        entry_count += 1;
    }

    let mut file = writer
        .finish()?
        .into_inner()
        .map_err(IntoInnerError::into_error)?;
    file.flush()?;
    file.sync_all()?;
    tracing::info!("Archived {} entries from {:?}", entry_count, src_dir);
    Ok(())
}

/// Replaces `dest_dir` with the contents of the archive at `archive_path`.
///
/// Anything already in `dest_dir` is deleted before extraction.
#[named]
pub fn unarchive<P1: AsRef<Path>, P2: AsRef<Path>>(archive_path: P1, dest_dir: P2) -> Result<()> {
    let archive_path = archive_path.as_ref();
    let dest_dir = dest_dir.as_ref();
    if !archive_path.is_file() {
        return Err(Error::invalid_input(format!(
            "Archive does not exist: {:?}",
            archive_path
        )));
    }

    (|| -> Result<()> {
        let mut archive = ZipArchive::new(BufReader::new(File::open(archive_path)?))?;
        delete_tree(dest_dir)?;
        std::fs::create_dir_all(dest_dir)?;
        archive.extract(dest_dir)?;
        tracing::info!(
            "Extracted {} entries from {:?} into {:?}",
            archive.len(),
            archive_path,
            dest_dir
        );
        Ok(())
    })()
    .with_debug_object_and_fn_name(archive_path.to_path_buf(), function_path!())
}
