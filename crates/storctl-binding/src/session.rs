//! RAII init/fini bracket around the native environment.

use std::ops::{Deref, DerefMut};

use tracing::debug;

use crate::error::BindingResult;
use crate::traits::Env;
use crate::types::EnvOptions;

/// An initialized environment, finalized on drop
///
/// Device calls go through `Deref`/`DerefMut` to the wrapped binding, so the
/// borrow checker keeps them inside the bracket.
pub struct EnvSession<'a, B: Env + ?Sized> {
    binding: &'a mut B,
    opts: EnvOptions,
}

impl<'a, B: Env + ?Sized> EnvSession<'a, B> {
    /// Initialize the environment and return the open session.
    ///
    /// # Errors
    ///
    /// Returns the binding's init error; nothing is finalized in that case.
    pub fn start(binding: &'a mut B, opts: &EnvOptions) -> BindingResult<Self> {
        binding.init_env(opts)?;
        debug!(
            include = ?opts.pci_include_list,
            disable_vmd = opts.disable_vmd,
            "environment initialized"
        );
        Ok(Self {
            binding,
            opts: opts.clone(),
        })
    }
}

impl<B: Env + ?Sized> Deref for EnvSession<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        self.binding
    }
}

impl<B: Env + ?Sized> DerefMut for EnvSession<'_, B> {
    fn deref_mut(&mut self) -> &mut B {
        self.binding
    }
}

impl<B: Env + ?Sized> Drop for EnvSession<'_, B> {
    fn drop(&mut self) {
        self.binding.fini_env(&self.opts);
        debug!("environment finalized");
    }
}
