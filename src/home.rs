//! Store path pair: the primary database file and the temporary used by
//! maintenance rewrites.
//!
//! Discovery of the primary path from the environment is a front-end
//! concern; the core only derives the temporary from it. The temporary name
//! is fixed relative to the store path so a copy stranded by a crash is
//! discoverable.

use std::path::{Path, PathBuf};

/// File-name suffix of the maintenance temporary.
pub const TMP_SUFFIX: &str = ".tmp";

/// The primary store path and its derived maintenance temporary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub primary: PathBuf,
    pub temporary: PathBuf,
}

impl StorePaths {
    #[must_use]
    pub fn new<P: Into<PathBuf>>(primary: P) -> Self {
        let primary = primary.into();
        let mut name = primary
            .file_name()
            .map_or_else(Default::default, std::ffi::OsStr::to_os_string);
        name.push(TMP_SUFFIX);
        let temporary = primary.with_file_name(name);
        Self { primary, temporary }
    }

    #[must_use]
    pub fn primary(&self) -> &Path {
        &self.primary
    }

    #[must_use]
    pub fn temporary(&self) -> &Path {
        &self.temporary
    }
}
