//! Error types for backend operations.

use storctl_binding::BindingError;
use storctl_errors::Fault;
use thiserror::Error;

use crate::config::ConfigError;
use crate::hugepages::HugePageError;
use crate::script::ScriptError;
use crate::user::UserError;
use crate::vmd::VmdError;

/// Errors raised by [`Backend`](crate::Backend) operations
///
/// [`BdevError::Fault`] carries a stable user-facing fault. Every other
/// variant names the phase that failed and wraps the underlying cause;
/// callers should treat those as opaque.
#[derive(Error, Debug)]
pub enum BdevError {
    /// User-facing fault with a stable code
    #[error(transparent)]
    Fault(#[from] Fault),

    /// Standard output could not be redirected before a native call
    #[error("failed to suppress native output: {0}")]
    SuppressOutput(#[source] std::io::Error),

    /// Native environment failed to initialize
    #[error("failed to init native env: {0}")]
    EnvInit(#[source] BindingError),

    /// Controller discovery failed
    #[error("failed to discover nvme: {0}")]
    Discover(#[source] BindingError),

    /// Native format request failed as a whole
    #[error("native format {devices:?}: {source}")]
    Format {
        /// Devices in the request
        devices: Vec<String>,
        /// Binding failure
        #[source]
        source: BindingError,
    },

    /// Native format returned no results
    #[error("empty results from native format request")]
    EmptyFormatResults,

    /// NVMe format requested with no devices
    #[error("empty pci address list in nvme format request")]
    EmptyDeviceList,

    /// Native format reported the same namespace twice
    #[error("duplicate result for ns {ns_id} on {pci_addr}")]
    DuplicateNamespaceResult {
        /// Controller PCI address
        pci_addr: String,
        /// Namespace id
        ns_id: u32,
    },

    /// Firmware update failed on a controller
    #[error("update firmware on {pci_addr}: {source}")]
    FirmwareUpdate {
        /// Controller PCI address
        pci_addr: String,
        /// Binding failure
        #[source]
        source: BindingError,
    },

    /// Target user could not be resolved
    #[error("lookup on local host: {source}")]
    UserLookup {
        /// User name from the request
        user: String,
        /// Lookup failure
        #[source]
        source: UserError,
    },

    /// Setup script failed
    #[error("{context}: {source}")]
    Script {
        /// Phase the script was run for
        context: &'static str,
        /// Script failure
        #[source]
        source: ScriptError,
    },

    /// Stale huge-page files could not be reclaimed
    #[error("clean spdk hugepages: {0}")]
    HugePages(#[source] HugePageError),

    /// VMD detection failed
    #[error("VMD could not be enabled: {0}")]
    VmdDetect(#[source] VmdError),

    /// Native shim library could not be loaded
    #[error("failed to load native binding: {0}")]
    NativeLoad(#[source] BindingError),

    /// Backend configuration is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl BdevError {
    /// The user-facing fault, if this error carries one.
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            BdevError::Fault(fault) => Some(fault),
            _ => None,
        }
    }

    pub(crate) fn script(context: &'static str) -> impl FnOnce(ScriptError) -> Self {
        move |source| BdevError::Script { context, source }
    }
}

/// A specialized `Result` type for backend operations.
pub type BdevResult<T> = std::result::Result<T, BdevError>;
