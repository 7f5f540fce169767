//! Deterministic in-memory binding for tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{BindingError, BindingResult};
use crate::traits::{Env, Nvme};
use crate::types::{Controller, EnvOptions, FormatResult};

/// A call observed by [`MockBinding`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingCall {
    /// `init_env` with the options passed
    InitEnv(EnvOptions),
    /// `fini_env`
    FiniEnv,
    /// `discover`
    Discover,
    /// `format`
    Format,
    /// `update`
    Update {
        /// Controller address
        pci_addr: String,
        /// Firmware image path
        firmware: PathBuf,
        /// Firmware slot
        slot: i32,
    },
    /// `clean_lock_files` with the addresses passed
    CleanLockFiles(Vec<String>),
}

#[derive(Debug, Default)]
struct MockState {
    controllers: Vec<Controller>,
    format_results: Option<Vec<FormatResult>>,
    init_rc: Option<i32>,
    discover_err: Option<String>,
    format_err: Option<String>,
    update_err: Option<String>,
    clean_err: Option<String>,
    active: Option<EnvOptions>,
    calls: Vec<BindingCall>,
}

/// Scripted binding that records every call
///
/// Clones share state, so a test can hand one clone to the code under test
/// and inspect the other afterwards. The mock enforces the same rules as
/// the native environment: a second `init_env` while one is active fails,
/// and device calls outside an environment fail.
#[derive(Debug, Clone, Default)]
pub struct MockBinding {
    state: Arc<Mutex<MockState>>,
}

impl MockBinding {
    /// Create a binding with no devices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Controllers returned by `discover`.
    pub fn with_controllers(self, controllers: Vec<Controller>) -> Self {
        self.state.lock().controllers = controllers;
        self
    }

    /// Results returned verbatim by `format`.
    ///
    /// Without this, `format` reports success for every namespace of every
    /// controller admitted by the include list.
    pub fn with_format_results(self, results: Vec<FormatResult>) -> Self {
        self.state.lock().format_results = Some(results);
        self
    }

    /// Make `init_env` fail with `rc`.
    pub fn fail_init(self, rc: i32) -> Self {
        self.state.lock().init_rc = Some(rc);
        self
    }

    /// Make `discover` fail.
    pub fn fail_discover(self, msg: impl Into<String>) -> Self {
        self.state.lock().discover_err = Some(msg.into());
        self
    }

    /// Make `format` fail as a whole.
    pub fn fail_format(self, msg: impl Into<String>) -> Self {
        self.state.lock().format_err = Some(msg.into());
        self
    }

    /// Make `update` fail.
    pub fn fail_update(self, msg: impl Into<String>) -> Self {
        self.state.lock().update_err = Some(msg.into());
        self
    }

    /// Make `clean_lock_files` fail.
    pub fn fail_clean_lock_files(self, msg: impl Into<String>) -> Self {
        self.state.lock().clean_err = Some(msg.into());
        self
    }

    /// Calls observed so far, in order.
    pub fn calls(&self) -> Vec<BindingCall> {
        self.state.lock().calls.clone()
    }

    /// Options of every `init_env` call, in order.
    pub fn init_options(&self) -> Vec<EnvOptions> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                BindingCall::InitEnv(opts) => Some(opts.clone()),
                _ => None,
            })
            .collect()
    }

    /// Whether an environment is currently initialized.
    pub fn is_env_active(&self) -> bool {
        self.state.lock().active.is_some()
    }
}

impl MockState {
    fn active_opts(&self) -> BindingResult<&EnvOptions> {
        self.active.as_ref().ok_or(BindingError::EnvNotActive)
    }
}

impl Env for MockBinding {
    fn init_env(&mut self, opts: &EnvOptions) -> BindingResult<()> {
        let mut state = self.state.lock();
        state.calls.push(BindingCall::InitEnv(opts.clone()));

        if state.active.is_some() {
            return Err(BindingError::EnvAlreadyActive);
        }
        opts.validate()?;
        if let Some(rc) = state.init_rc {
            return Err(BindingError::EnvInit { rc });
        }

        state.active = Some(opts.clone());
        Ok(())
    }

    fn fini_env(&mut self, _opts: &EnvOptions) {
        let mut state = self.state.lock();
        state.calls.push(BindingCall::FiniEnv);
        state.active = None;
    }
}

impl Nvme for MockBinding {
    fn discover(&mut self) -> BindingResult<Vec<Controller>> {
        let mut state = self.state.lock();
        state.calls.push(BindingCall::Discover);

        let opts = state.active_opts()?;
        if let Some(msg) = &state.discover_err {
            return Err(BindingError::discover(msg.clone()));
        }

        Ok(state
            .controllers
            .iter()
            .filter(|c| opts.includes(&c.pci_addr))
            .cloned()
            .collect())
    }

    fn format(&mut self) -> BindingResult<Vec<FormatResult>> {
        let mut state = self.state.lock();
        state.calls.push(BindingCall::Format);

        let opts = state.active_opts()?;
        if let Some(msg) = &state.format_err {
            return Err(BindingError::format(msg.clone()));
        }
        if let Some(results) = &state.format_results {
            return Ok(results.clone());
        }

        Ok(state
            .controllers
            .iter()
            .filter(|c| opts.includes(&c.pci_addr))
            .flat_map(|c| {
                c.namespaces
                    .iter()
                    .map(|ns| FormatResult::ok(c.pci_addr.clone(), ns.id))
            })
            .collect())
    }

    fn update(&mut self, pci_addr: &str, firmware: &Path, slot: i32) -> BindingResult<()> {
        let mut state = self.state.lock();
        state.calls.push(BindingCall::Update {
            pci_addr: pci_addr.to_string(),
            firmware: firmware.to_path_buf(),
            slot,
        });

        state.active_opts()?;
        match &state.update_err {
            Some(msg) => Err(BindingError::update(pci_addr, msg.clone())),
            None => Ok(()),
        }
    }

    fn clean_lock_files(&mut self, pci_addrs: &[String]) -> BindingResult<()> {
        let mut state = self.state.lock();
        state.calls.push(BindingCall::CleanLockFiles(pci_addrs.to_vec()));

        match &state.clean_err {
            Some(msg) => Err(BindingError::LockFile {
                path: PathBuf::from(crate::lock_files::DEFAULT_LOCK_DIR),
                source: std::io::Error::other(msg.clone()),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_init_rejected() {
        let mut binding = MockBinding::new();
        assert!(binding.init_env(&EnvOptions::default()).is_ok());
        assert!(matches!(
            binding.init_env(&EnvOptions::default()),
            Err(BindingError::EnvAlreadyActive)
        ));
        binding.fini_env(&EnvOptions::default());
        assert!(binding.init_env(&EnvOptions::default()).is_ok());
    }

    #[test]
    fn test_calls_outside_env_rejected() {
        let mut binding = MockBinding::new();
        assert!(matches!(binding.discover(), Err(BindingError::EnvNotActive)));
        assert!(matches!(binding.format(), Err(BindingError::EnvNotActive)));
        assert!(matches!(
            binding.update("0000:81:00.0", Path::new("/fw.bin"), 0),
            Err(BindingError::EnvNotActive)
        ));
    }

    #[test]
    fn test_default_format_covers_included_namespaces() -> BindingResult<()> {
        let mut binding = MockBinding::new().with_controllers(vec![
            Controller::new("0000:81:00.0").with_namespace(1, 1).with_namespace(2, 1),
            Controller::new("0000:82:00.0").with_namespace(1, 1),
        ]);
        binding.init_env(&EnvOptions::default().with_include_list(["0000:81:00.0"]))?;
        let results = binding.format()?;
        binding.fini_env(&EnvOptions::default());

        assert_eq!(
            results,
            vec![
                FormatResult::ok("0000:81:00.0", 1),
                FormatResult::ok("0000:81:00.0", 2),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_invalid_include_list_rejected_at_init() {
        let mut binding = MockBinding::new();
        let opts = EnvOptions::default().with_include_list(["nvme0"]);
        assert!(matches!(
            binding.init_env(&opts),
            Err(BindingError::InvalidPciAddress(_))
        ));
        assert!(!binding.is_env_active());
    }
}
