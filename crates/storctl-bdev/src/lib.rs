//! NVMe block-device backend for the storage management plane
//!
//! [`Backend`] drives the native user-space storage framework through a
//! [`storctl_binding::Binding`] and the host through a few narrow
//! collaborators:
//!
//! - [`output::StdoutRedirect`]: silences the framework's stdout chatter
//!   around every native call
//! - [`script::ScriptRunner`]: the setup script that moves devices between
//!   kernel and user-space drivers
//! - [`vmd::VmdLister`]: the `lspci | grep` pipeline used to find VMD
//!   bridges
//! - [`hugepages::HugePageCleaner`]: removes huge-page files left by dead
//!   sessions
//! - [`user::UserResolver`]: maps the target user to a uid
//!
//! Each collaborator has a system implementation (the builder default) and
//! a recording fake under its module's `mock`.
//!
//! # Example
//!
//! ```
//! use storctl_bdev::prelude::*;
//! use storctl_bdev::output::mock::RecordingRedirect;
//!
//! # fn main() -> BdevResult<()> {
//! let binding = MockBinding::new().with_controllers(vec![
//!     Controller::new("0000:81:00.0").with_namespace(1, 1 << 30),
//! ]);
//! let mut backend = Backend::builder(binding)
//!     .redirect(RecordingRedirect::new())
//!     .build();
//!
//! let resp = backend.format(&FormatRequest::new(BdevClass::Nvme, ["0000:81:00.0"]))?;
//! assert!(resp.all_formatted());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod backend;
pub mod config;
pub mod error;
pub mod format;
pub mod hugepages;
pub mod output;
pub mod prelude;
pub mod request;
pub mod script;
pub mod user;
pub mod vmd;

pub use backend::{Backend, BackendBuilder};
pub use config::BackendConfig;
pub use error::{BdevError, BdevResult};
pub use format::{format_resp_from_results, skipped_format_response};
pub use request::{
    BdevClass, DeviceFormatResponse, FormatRequest, FormatResponse, PrepareRequest,
    PrepareResponse, ScanRequest, ScanResponse,
};
