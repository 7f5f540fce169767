//! Capability traits over the SPDK environment and NVMe device operations
//!
//! This crate is the only place in the workspace that talks to the native
//! user-space storage framework. Everything above it programs against two
//! traits:
//!
//! - [`Env`]: initialize and finalize the framework environment
//! - [`Nvme`]: discover controllers, format namespaces, update firmware and
//!   clean the per-device lock files the framework leaves behind
//!
//! Exactly one environment may be active per process, and every [`Nvme`]
//! call must happen between [`Env::init_env`] and [`Env::fini_env`].
//! [`EnvSession`] enforces the bracketing with RAII.
//!
//! Two implementations are provided:
//!
//! - [`mock::MockBinding`]: a deterministic fake with scripted controllers
//!   and format results that records every call
//! - `native::NativeBinding` (feature `native`): loads a C shim library at
//!   runtime
//!
//! # Example
//!
//! ```
//! use storctl_binding::prelude::*;
//!
//! # fn main() -> BindingResult<()> {
//! let mut binding = MockBinding::new()
//!     .with_controllers(vec![Controller::new("0000:81:00.0").with_namespace(1, 1 << 30)]);
//!
//! let opts = EnvOptions::default();
//! let mut session = EnvSession::start(&mut binding, &opts)?;
//! let ctrlrs = session.discover()?;
//! assert_eq!(ctrlrs.len(), 1);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod error;
pub mod lock_files;
pub mod mock;
pub mod pci;
pub mod prelude;
pub mod session;
pub mod traits;
pub mod types;

#[cfg(feature = "native")]
#[cfg_attr(docsrs, doc(cfg(feature = "native")))]
pub mod native;

pub use error::{BindingError, BindingResult};
pub use lock_files::{DEFAULT_LOCK_DIR, LOCK_FILE_PREFIX, lock_file_path, remove_lock_files};
pub use mock::{BindingCall, MockBinding};
pub use pci::{PCI_DEFAULT_DOMAIN, is_valid_pci_address, with_domain};
pub use session::EnvSession;
pub use traits::{Binding, Env, Nvme};
pub use types::{Controller, EnvOptions, FormatResult, Namespace};

#[cfg(feature = "native")]
pub use native::NativeBinding;
