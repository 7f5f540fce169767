//! Convenience re-exports for binding consumers.

pub use crate::error::{BindingError, BindingResult};
pub use crate::mock::{BindingCall, MockBinding};
pub use crate::session::EnvSession;
pub use crate::traits::{Binding, Env, Nvme};
pub use crate::types::{Controller, EnvOptions, FormatResult, Namespace};

#[cfg(feature = "native")]
pub use crate::native::NativeBinding;
