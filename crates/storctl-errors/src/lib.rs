//! Stable, user-facing fault types for storctl
//!
//! Two tiers of errors flow out of the block-device backend:
//!
//! - [`Fault`]: a typed error carrying a stable [`FaultCode`], a human message
//!   and an operator resolution hint. Faults are meant to be interpreted by an
//!   operator or an orchestration layer.
//! - Crate-local internal errors (binding, script, filesystem) that wrap the
//!   underlying cause with the phase that failed. Those live next to the code
//!   that raises them and carry no stable code.
//!
//! This crate only holds the first tier so that every crate in the workspace
//! (and every consumer of a response) agrees on the same codes.
//!
//! # Example
//!
//! ```
//! use storctl_errors::prelude::*;
//!
//! let fault = Fault::format_failure("0000:5d:00.0", vec![2, 3], "namespace 2: media error");
//! assert_eq!(fault.code(), FaultCode::BdevFormatFailure);
//! assert!(fault.to_string().contains("[2 3]"));
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod fault;
pub mod prelude;

pub use fault::{Fault, FaultCode, FaultDomain, NamespaceList};

/// A specialized `Result` type for operations that fail with a [`Fault`].
pub type FaultResult<T> = std::result::Result<T, Fault>;
