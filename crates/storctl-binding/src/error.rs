//! Error types for binding operations

use std::ffi::NulError;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the environment and device bindings
#[derive(Error, Debug)]
pub enum BindingError {
    /// An environment is already initialized in this process
    #[error("environment already active")]
    EnvAlreadyActive,

    /// A device call was made outside an init/fini bracket
    #[error("environment not active")]
    EnvNotActive,

    /// Include-list entry is not a PCI address
    #[error("invalid PCI address in include list: {0:?}")]
    InvalidPciAddress(String),

    /// Environment initialization returned an error code
    #[error("environment init failed (rc={rc})")]
    EnvInit {
        /// Native return code
        rc: i32,
    },

    /// Controller discovery failed
    #[error("discover failed: {0}")]
    Discover(String),

    /// Namespace format request failed as a whole
    #[error("format failed: {0}")]
    Format(String),

    /// Firmware update failed on a controller
    #[error("firmware update on {pci_addr} failed: {reason}")]
    Update {
        /// Controller PCI address
        pci_addr: String,
        /// Failure description
        reason: String,
    },

    /// A lock file could not be removed
    #[error("failed to remove lock file {path:?}: {source}")]
    LockFile {
        /// Lock file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Native shim library could not be loaded or is missing a symbol
    #[error("native library load failed: {0}")]
    LibraryLoad(String),

    /// Native shim returned JSON that does not decode
    #[error("malformed response from native library: {0}")]
    Decode(#[from] serde_json::Error),

    /// Argument contains an interior nul byte
    #[error("argument contains nul byte")]
    Nul(#[from] NulError),
}

impl BindingError {
    /// Create a discover error.
    pub fn discover(msg: impl Into<String>) -> Self {
        BindingError::Discover(msg.into())
    }

    /// Create a format error.
    pub fn format(msg: impl Into<String>) -> Self {
        BindingError::Format(msg.into())
    }

    /// Create a firmware update error.
    pub fn update(pci_addr: impl Into<String>, reason: impl Into<String>) -> Self {
        BindingError::Update {
            pci_addr: pci_addr.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error reports misuse of the init/fini bracket.
    pub fn is_env_misuse(&self) -> bool {
        matches!(
            self,
            BindingError::EnvAlreadyActive | BindingError::EnvNotActive
        )
    }
}

/// A specialized `Result` type for binding operations.
pub type BindingResult<T> = std::result::Result<T, BindingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            BindingError::EnvInit { rc: -19 }.to_string(),
            "environment init failed (rc=-19)"
        );
        assert_eq!(
            BindingError::update("0000:81:00.0", "rc=-5").to_string(),
            "firmware update on 0000:81:00.0 failed: rc=-5"
        );
    }

    #[test]
    fn test_env_misuse() {
        assert!(BindingError::EnvAlreadyActive.is_env_misuse());
        assert!(BindingError::EnvNotActive.is_env_misuse());
        assert!(!BindingError::discover("x").is_env_misuse());
    }
}
