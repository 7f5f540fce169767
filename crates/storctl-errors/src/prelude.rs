//! Convenience re-exports for fault handling.

pub use crate::{
    FaultResult,
    fault::{Fault, FaultCode, FaultDomain, NamespaceList},
};
