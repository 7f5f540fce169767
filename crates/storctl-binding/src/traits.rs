//! Capability traits over the native environment and devices

use std::path::Path;

use crate::error::BindingResult;
use crate::types::{Controller, EnvOptions, FormatResult};

/// Native environment lifecycle
///
/// The environment is process-global and not reentrant: at most one
/// init/fini bracket may be in flight.
pub trait Env: Send {
    /// Initialize the environment with the given options.
    fn init_env(&mut self, opts: &EnvOptions) -> BindingResult<()>;

    /// Finalize the environment. Must follow a successful `init_env`.
    fn fini_env(&mut self, opts: &EnvOptions);
}

/// NVMe device operations, valid only inside an initialized environment
pub trait Nvme: Send {
    /// Discover controllers visible to the environment.
    ///
    /// Returns an empty list when no devices are present.
    fn discover(&mut self) -> BindingResult<Vec<Controller>>;

    /// Format every namespace of every controller in the environment.
    ///
    /// Returns one result per (controller, namespace).
    fn format(&mut self) -> BindingResult<Vec<FormatResult>>;

    /// Write and commit a firmware image to `slot` on one controller.
    fn update(&mut self, pci_addr: &str, firmware: &Path, slot: i32) -> BindingResult<()>;

    /// Remove per-device lock files left behind by the environment.
    fn clean_lock_files(&mut self, pci_addrs: &[String]) -> BindingResult<()>;
}

/// Full binding: environment plus device operations.
pub trait Binding: Env + Nvme {}

impl<T: Env + Nvme> Binding for T {}

impl<T: Env + ?Sized> Env for Box<T> {
    fn init_env(&mut self, opts: &EnvOptions) -> BindingResult<()> {
        (**self).init_env(opts)
    }

    fn fini_env(&mut self, opts: &EnvOptions) {
        (**self).fini_env(opts)
    }
}

impl<T: Nvme + ?Sized> Nvme for Box<T> {
    fn discover(&mut self) -> BindingResult<Vec<Controller>> {
        (**self).discover()
    }

    fn format(&mut self) -> BindingResult<Vec<FormatResult>> {
        (**self).format()
    }

    fn update(&mut self, pci_addr: &str, firmware: &Path, slot: i32) -> BindingResult<()> {
        (**self).update(pci_addr, firmware, slot)
    }

    fn clean_lock_files(&mut self, pci_addrs: &[String]) -> BindingResult<()> {
        (**self).clean_lock_files(pci_addrs)
    }
}
