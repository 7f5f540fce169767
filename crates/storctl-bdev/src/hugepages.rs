//! Reclaim of stale huge-page files.
//!
//! Each native environment backs its memory with files under the hugetlbfs
//! mount. A session that dies without finalizing leaves them behind, owned
//! by the user it ran as, and the next environment for that user fails to
//! initialize.

use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

/// Default hugetlbfs mount point.
pub const DEFAULT_HUGEPAGE_DIR: &str = "/dev/hugepages";

/// File name prefix of native environment huge-page files.
pub const DEFAULT_HUGEPAGE_PREFIX: &str = "spdk";

/// Errors raised while reclaiming huge pages
#[derive(Error, Debug)]
pub enum HugePageError {
    /// Directory listing or entry metadata could not be read
    #[error("walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    /// Matching file could not be removed
    #[error("failed to remove {path:?}: {source}")]
    Remove {
        /// File path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Removes stale huge-page files owned by a user
pub trait HugePageCleaner: Send {
    /// Remove every stale file owned by `uid`, returning how many were
    /// removed.
    fn clean(&mut self, uid: u32) -> Result<usize, HugePageError>;
}

/// Huge-page directory on the local filesystem
///
/// Only direct children of the root are considered; subdirectories are
/// neither removed nor descended into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HugePageDir {
    root: PathBuf,
    prefix: String,
}

impl Default for HugePageDir {
    fn default() -> Self {
        Self::new(DEFAULT_HUGEPAGE_DIR, DEFAULT_HUGEPAGE_PREFIX)
    }
}

impl HugePageDir {
    /// Cleaner for files named `prefix*` under `root`.
    pub fn new(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.into(),
        }
    }
}

impl HugePageCleaner for HugePageDir {
    fn clean(&mut self, uid: u32) -> Result<usize, HugePageError> {
        let mut removed = 0usize;

        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry?;
            if entry.file_type().is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            if !name.starts_with(&self.prefix) {
                continue;
            }

            if entry.metadata()?.uid() != uid {
                continue;
            }

            std::fs::remove_file(entry.path()).map_err(|source| HugePageError::Remove {
                path: entry.path().to_path_buf(),
                source,
            })?;
            debug!(path = %entry.path().display(), "removed stale huge-page file");
            removed = removed.saturating_add(1);
        }

        Ok(removed)
    }
}

pub mod mock {
    //! Cleaner that records the uids it was asked to clean.

    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    /// In-memory [`HugePageCleaner`]; clones share state
    #[derive(Debug, Clone, Default)]
    pub struct RecordingCleaner {
        uids: Arc<Mutex<Vec<u32>>>,
        fail: bool,
    }

    impl RecordingCleaner {
        /// Create a recorder.
        pub fn new() -> Self {
            Self::default()
        }

        /// Make `clean` fail.
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        /// Uids passed to `clean`, in order.
        pub fn uids(&self) -> Vec<u32> {
            self.uids.lock().clone()
        }

        /// Whether `clean` was ever called.
        pub fn was_called(&self) -> bool {
            !self.uids.lock().is_empty()
        }
    }

    impl HugePageCleaner for RecordingCleaner {
        fn clean(&mut self, uid: u32) -> Result<usize, HugePageError> {
            self.uids.lock().push(uid);
            if self.fail {
                return Err(HugePageError::Remove {
                    path: PathBuf::from(DEFAULT_HUGEPAGE_DIR).join("spdk_map_0"),
                    source: io::Error::from(io::ErrorKind::PermissionDenied),
                });
            }
            Ok(0)
        }
    }
}
