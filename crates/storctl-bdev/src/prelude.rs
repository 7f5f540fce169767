//! Convenience re-exports for backend consumers.

pub use crate::backend::{Backend, BackendBuilder};
pub use crate::config::BackendConfig;
pub use crate::error::{BdevError, BdevResult};
pub use crate::hugepages::HugePageCleaner;
pub use crate::output::StdoutRedirect;
pub use crate::request::{
    BdevClass, DeviceFormatResponse, FormatRequest, FormatResponse, PrepareRequest,
    PrepareResponse, ScanRequest, ScanResponse,
};
pub use crate::script::ScriptRunner;
pub use crate::user::UserResolver;
pub use crate::vmd::VmdLister;

pub use storctl_binding::{Binding, Controller, EnvOptions, FormatResult, MockBinding};
pub use storctl_errors::{Fault, FaultCode};
