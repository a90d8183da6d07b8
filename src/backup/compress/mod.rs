use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use validator::Validate;
use zip::write::FileOptions;
use zip::CompressionMethod;

/// Highest deflate level supported by every zip backend
static DEFAULT_COMPRESSION_LEVEL: i64 = 9;

/// Configuration for the deflate stream of archive backups
///
/// Save data is small and restored rarely, so the default trades CPU time
/// for the smallest archive.
#[skip_serializing_none]
#[derive(Clone, Default, Validate, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DeflateConfig {
    /// Compression level (0-9)
    ///
    /// - 0: Stored deflate blocks, fastest
    /// - 9: Default, smallest archives
    #[validate(range(min = 0, max = 9))]
    level: Option<i64>,
}

impl DeflateConfig {
    pub fn with_level(level: i64) -> Self {
        Self { level: Some(level) }
    }

    pub fn level(&self) -> i64 {
        self.level.unwrap_or(DEFAULT_COMPRESSION_LEVEL)
    }

    /// Entry options for a file of `len` bytes.
    pub fn file_options(&self, len: u64) -> FileOptions<'static, ()> {
        FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(self.level()))
            .large_file(len >= u64::from(u32::MAX))
    }

    pub fn dir_options(&self) -> FileOptions<'static, ()> {
        FileOptions::default().compression_method(CompressionMethod::Stored)
    }
}
