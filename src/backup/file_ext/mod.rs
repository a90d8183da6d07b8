use std::path::Path;
use std::sync::Arc;

pub static ARCHIVE_FILE_EXT: &str = "zip";

pub trait FileExtProvider {
    fn file_ext(&self) -> Option<Arc<str>>;
}

/// Case-insensitive check against [`ARCHIVE_FILE_EXT`].
pub fn has_archive_ext<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ARCHIVE_FILE_EXT))
}

/// Appends the provider's extension to `base`, or returns `base` as is when there is none.
pub fn with_file_ext<F: FileExtProvider + ?Sized>(provider: &F, base: &str) -> String {
    match provider.file_ext() {
        Some(ext) => format!("{base}.{ext}"),
        None => base.to_string(),
    }
}
