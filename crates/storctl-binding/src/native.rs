//! Binding backed by a runtime-loaded C shim over the native framework.
//!
//! The shim exports a small C ABI. Structured data crosses the boundary as
//! JSON strings allocated by the shim and released with
//! `storctl_free_string`:
//!
//! ```c
//! int   storctl_env_init(const char *opts_json);
//! void  storctl_env_fini(void);
//! int   storctl_discover(char **out_json);
//! int   storctl_format(char **out_json);
//! int   storctl_fw_update(const char *pci_addr, const char *path, int slot);
//! void  storctl_free_string(char *s);
//! ```
//!
//! Non-zero return codes are failures. On failure `out_json`, when set,
//! holds a message rather than a result document.

#![expect(unsafe_code, reason = "FFI into the native shim library")]

use std::ffi::{CStr, CString, c_char, c_int};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use libloading::{Library, Symbol};
use tracing::{debug, info, warn};

use crate::error::{BindingError, BindingResult};
use crate::lock_files::{DEFAULT_LOCK_DIR, remove_lock_files};
use crate::traits::{Env, Nvme};
use crate::types::{Controller, EnvOptions, FormatResult};

type EnvInitFn = unsafe extern "C" fn(*const c_char) -> c_int;
type EnvFiniFn = unsafe extern "C" fn();
type JsonOutFn = unsafe extern "C" fn(*mut *mut c_char) -> c_int;
type FwUpdateFn = unsafe extern "C" fn(*const c_char, *const c_char, c_int) -> c_int;
type FreeStringFn = unsafe extern "C" fn(*mut c_char);

/// One environment per process, across every loaded binding.
static ENV_ACTIVE: AtomicBool = AtomicBool::new(false);

#[derive(Clone, Copy)]
struct ShimVTable {
    env_init: EnvInitFn,
    env_fini: EnvFiniFn,
    discover: JsonOutFn,
    format: JsonOutFn,
    fw_update: FwUpdateFn,
    free_string: FreeStringFn,
}

/// Binding over the native shim library
pub struct NativeBinding {
    vtable: ShimVTable,
    lock_dir: PathBuf,
    active: bool,
    // Keeps the function pointers in `vtable` valid.
    _library: Library,
}

impl std::fmt::Debug for NativeBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeBinding")
            .field("lock_dir", &self.lock_dir)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

fn symbol<T: Copy>(library: &Library, name: &[u8]) -> BindingResult<T> {
    // SAFETY: every caller pairs `name` with the function type the shim
    // header declares for it.
    let sym: Symbol<'_, T> = unsafe { library.get(name) }.map_err(|e| {
        BindingError::LibraryLoad(format!(
            "missing symbol {}: {e}",
            String::from_utf8_lossy(name)
        ))
    })?;
    Ok(*sym)
}

impl NativeBinding {
    /// Load the shim from `library_path`, cleaning lock files under
    /// `lock_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::LibraryLoad`] when the library cannot be
    /// opened or lacks one of the required symbols.
    pub fn load(library_path: &Path, lock_dir: impl Into<PathBuf>) -> BindingResult<Self> {
        // SAFETY: loading runs the shim's initializers; the shim is trusted
        // system software installed alongside this binary.
        let library = unsafe { Library::new(library_path) }
            .map_err(|e| BindingError::LibraryLoad(e.to_string()))?;

        let vtable = ShimVTable {
            env_init: symbol::<EnvInitFn>(&library, b"storctl_env_init")?,
            env_fini: symbol::<EnvFiniFn>(&library, b"storctl_env_fini")?,
            discover: symbol::<JsonOutFn>(&library, b"storctl_discover")?,
            format: symbol::<JsonOutFn>(&library, b"storctl_format")?,
            fw_update: symbol::<FwUpdateFn>(&library, b"storctl_fw_update")?,
            free_string: symbol::<FreeStringFn>(&library, b"storctl_free_string")?,
        };

        info!(library = %library_path.display(), "native binding loaded");

        Ok(Self {
            vtable,
            lock_dir: lock_dir.into(),
            active: false,
            _library: library,
        })
    }

    /// Load the shim using the default lock file directory.
    ///
    /// # Errors
    ///
    /// See [`NativeBinding::load`].
    pub fn load_default(library_path: &Path) -> BindingResult<Self> {
        Self::load(library_path, DEFAULT_LOCK_DIR)
    }

    fn ensure_active(&self) -> BindingResult<()> {
        if self.active {
            Ok(())
        } else {
            Err(BindingError::EnvNotActive)
        }
    }

    /// Call a JSON-producing shim entry point and take ownership of the
    /// returned string.
    fn call_json(&self, f: JsonOutFn) -> (c_int, Option<String>) {
        let mut out: *mut c_char = std::ptr::null_mut();
        // SAFETY: `out` is a valid location for the shim to store one
        // heap string pointer.
        let rc = unsafe { f(&mut out) };
        if out.is_null() {
            return (rc, None);
        }

        // SAFETY: a non-null `out` points to a nul-terminated string
        // allocated by the shim.
        let text = unsafe { CStr::from_ptr(out) }.to_string_lossy().into_owned();
        // SAFETY: `out` came from the shim and is released exactly once.
        unsafe { (self.vtable.free_string)(out) };
        (rc, Some(text))
    }
}

impl Env for NativeBinding {
    fn init_env(&mut self, opts: &EnvOptions) -> BindingResult<()> {
        opts.validate()?;
        if ENV_ACTIVE.swap(true, Ordering::AcqRel) {
            return Err(BindingError::EnvAlreadyActive);
        }

        let init = || -> BindingResult<()> {
            let json = CString::new(serde_json::to_string(opts)?)?;
            // SAFETY: `json` is a valid nul-terminated string that outlives
            // the call.
            let rc = unsafe { (self.vtable.env_init)(json.as_ptr()) };
            if rc != 0 {
                return Err(BindingError::EnvInit { rc });
            }
            Ok(())
        };

        match init() {
            Ok(()) => {
                self.active = true;
                Ok(())
            }
            Err(e) => {
                ENV_ACTIVE.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    fn fini_env(&mut self, _opts: &EnvOptions) {
        if !self.active {
            warn!("fini_env without an active environment");
            return;
        }
        // SAFETY: the environment was initialized by this binding.
        unsafe { (self.vtable.env_fini)() };
        self.active = false;
        ENV_ACTIVE.store(false, Ordering::Release);
    }
}

impl Nvme for NativeBinding {
    fn discover(&mut self) -> BindingResult<Vec<Controller>> {
        self.ensure_active()?;
        match self.call_json(self.vtable.discover) {
            (0, Some(json)) => Ok(serde_json::from_str(&json)?),
            (0, None) => Ok(Vec::new()),
            (rc, msg) => Err(BindingError::discover(
                msg.unwrap_or_else(|| format!("rc={rc}")),
            )),
        }
    }

    fn format(&mut self) -> BindingResult<Vec<FormatResult>> {
        self.ensure_active()?;
        match self.call_json(self.vtable.format) {
            (0, Some(json)) => Ok(serde_json::from_str(&json)?),
            (0, None) => Ok(Vec::new()),
            (rc, msg) => Err(BindingError::format(
                msg.unwrap_or_else(|| format!("rc={rc}")),
            )),
        }
    }

    fn update(&mut self, pci_addr: &str, firmware: &Path, slot: i32) -> BindingResult<()> {
        self.ensure_active()?;
        let addr = CString::new(pci_addr)?;
        let path = CString::new(firmware.to_string_lossy().into_owned())?;

        // SAFETY: both strings are valid and nul-terminated for the
        // duration of the call.
        let rc = unsafe { (self.vtable.fw_update)(addr.as_ptr(), path.as_ptr(), slot) };
        if rc != 0 {
            return Err(BindingError::update(pci_addr, format!("rc={rc}")));
        }
        debug!(pci_addr, slot, "firmware committed");
        Ok(())
    }

    fn clean_lock_files(&mut self, pci_addrs: &[String]) -> BindingResult<()> {
        remove_lock_files(&self.lock_dir, pci_addrs)
    }
}
