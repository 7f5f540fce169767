//! Per-device lock files.
//!
//! The native environment claims each device it attaches by creating a lock
//! file named after the PCI address. A process that exits without
//! finalizing leaves them behind and later environments refuse to attach.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{BindingError, BindingResult};

/// Directory the native environment creates lock files in.
pub const DEFAULT_LOCK_DIR: &str = "/var/tmp";

/// File name prefix of a device lock file.
pub const LOCK_FILE_PREFIX: &str = "spdk_pci_lock_";

/// Lock file path for one device.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use storctl_binding::lock_file_path;
///
/// assert_eq!(
///     lock_file_path(Path::new("/var/tmp"), "0000:81:00.0"),
///     Path::new("/var/tmp/spdk_pci_lock_0000:81:00.0"),
/// );
/// ```
pub fn lock_file_path(dir: &Path, pci_addr: &str) -> PathBuf {
    dir.join(format!("{LOCK_FILE_PREFIX}{pci_addr}"))
}

/// Remove the lock files for `pci_addrs` under `dir`.
///
/// Missing files are not an error. Every address is attempted; the first
/// failure is returned after the rest have been tried.
///
/// # Errors
///
/// Returns [`BindingError::LockFile`] for the first file that exists but
/// could not be removed.
pub fn remove_lock_files(dir: &Path, pci_addrs: &[String]) -> BindingResult<()> {
    let mut first_err = None;

    for addr in pci_addrs {
        let path = lock_file_path(dir, addr);
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "removed lock file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to remove lock file");
                if first_err.is_none() {
                    first_err = Some(BindingError::LockFile { path, source: e });
                }
            }
        }
    }

    first_err.map_or(Ok(()), Err)
}
