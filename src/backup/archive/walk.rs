use crate::backup::archive::ArchiveEntry;
use crate::backup::function_path;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{WithDebugObjectAndFnName, WithMsg};

use dyn_iter::{DynIter, IntoDynIterator};
use function_name::named;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Every file and directory below a root, named relative to that root
///
/// Symbolic links are followed and archived as the files or directories they
/// point to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalkSource {
    src_dir: PathBuf,
}

impl WalkSource {
    pub fn new<P: Into<PathBuf>>(src_dir: P) -> Self {
        Self {
            src_dir: src_dir.into(),
        }
    }

    pub fn src_dir(&self) -> &Path {
        &self.src_dir
    }

    #[named]
    pub fn archive_entry_iterator<'a>(&self) -> Result<DynIter<'a, Result<ArchiveEntry>>> {
        if !self.src_dir.is_dir() {
            tracing::error!(
                "Source directory does not exist or is not a directory: {:?}",
                self.src_dir
            );
            return Err(Error::invalid_input(format!(
                "{:?} is not a directory",
                self.src_dir
            )));
        }

        tracing::debug!("Scanning directory {:?}", self.src_dir);

        let src_dir = self.src_dir.clone();
        let root = self.src_dir.clone();
        let entries = WalkDir::new(&self.src_dir)
            .follow_links(true)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .map(move |res| match res {
                Ok(de) => process_dir_entry(de, &src_dir),
                Err(e) => Err(e.into()),
            })
            .map(move |res| res.with_debug_object_and_fn_name(root.clone(), function_path!()));

        Ok(entries.into_dyn_iter())
    }
}

fn process_dir_entry<P: AsRef<Path>>(de: DirEntry, base_src_dir: P) -> Result<ArchiveEntry> {
    let is_dir = de.file_type().is_dir();
    let p = de.into_path();
    let stripped = p
        .strip_prefix(base_src_dir.as_ref())
        .map(Path::to_path_buf)
        .map_err(|e| {
            Error::from(e).with_msg(format!(
                "Stripping {:?} from {:?} failed",
                base_src_dir.as_ref(),
                p
            ))
        })?;

    let entry = if is_dir {
        ArchiveEntry::dir(p, stripped)
    } else {
        ArchiveEntry::file(p, stripped)
    };
    tracing::trace!("Including: {:?} -> {:?}", entry.src, entry.dst);
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::result_error::error::ErrorKind;
    use tempfile::TempDir;

    fn create_test_files(dir: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(dir.join("subdir"))?;
        std::fs::write(dir.join("file1.sav"), "content1")?;
        std::fs::write(dir.join("file2.json"), "content2")?;
        std::fs::write(dir.join("subdir/file3.sav"), "content3")?;
        Ok(())
    }

    #[test]
    fn test_entries_are_relative_to_root() {
        let temp_dir = TempDir::new().unwrap();
        create_test_files(temp_dir.path()).unwrap();

        let entries: Vec<_> = WalkSource::new(temp_dir.path())
            .archive_entry_iterator()
            .unwrap()
            .map(|e| e.unwrap())
            .collect();

        let dsts: Vec<_> = entries.iter().map(|e| e.dst.to_path_buf()).collect();
        assert_eq!(
            dsts,
            vec![
                PathBuf::from("file1.sav"),
                PathBuf::from("file2.json"),
                PathBuf::from("subdir"),
                PathBuf::from("subdir").join("file3.sav"),
            ]
        );
        assert!(entries.iter().all(|e| e.src.starts_with(temp_dir.path())));
        assert!(entries[2].is_dir);
        assert!(!entries[3].is_dir);
    }

    #[test]
    fn test_empty_directory_yields_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let entries = WalkSource::new(temp_dir.path())
            .archive_entry_iterator()
            .unwrap();
        assert_eq!(entries.count(), 0);
    }

    #[test]
    fn test_nonexistent_directory() {
        let source = WalkSource::new("/nonexistent/directory");
        let err = source.archive_entry_iterator().err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_file_as_src_dir() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("not_a_directory.txt");
        std::fs::write(&file_path, "content").unwrap();

        assert!(WalkSource::new(file_path).archive_entry_iterator().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_is_followed() {
        let temp_dir = TempDir::new().unwrap();
        let real = temp_dir.path().join("real");
        std::fs::create_dir_all(&real).unwrap();
        std::fs::write(real.join("inner.sav"), "x").unwrap();
        let root = temp_dir.path().join("root");
        std::fs::create_dir_all(&root).unwrap();
        std::os::unix::fs::symlink(&real, root.join("link")).unwrap();

        let dsts: Vec<_> = WalkSource::new(&root)
            .archive_entry_iterator()
            .unwrap()
            .map(|e| e.unwrap().dst.to_path_buf())
            .collect();
        assert!(dsts.contains(&PathBuf::from("link").join("inner.sav")));
    }
}
