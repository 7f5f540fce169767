//! External setup script that hands devices between kernel and user-space
//! drivers.

use std::path::PathBuf;
use std::process::{Command, Output};

use thiserror::Error;
use tracing::{debug, info};

use crate::request::PrepareRequest;

/// Default location of the setup script.
pub const DEFAULT_SETUP_SCRIPT: &str = "/usr/share/storctl/setup_spdk.sh";

/// Default number of huge pages to allocate on prepare.
pub const DEFAULT_NR_HUGEPAGES: u32 = 4096;

const DEFAULT_SEARCH_PATH: &str = "/sbin:/bin:/usr/sbin:/usr/bin";

/// Errors raised while running the setup script
#[derive(Error, Debug)]
pub enum ScriptError {
    /// Script could not be started
    #[error("failed to run {script:?}: {source}")]
    Spawn {
        /// Script path
        script: PathBuf,
        /// Spawn failure
        #[source]
        source: std::io::Error,
    },

    /// Script exited unsuccessfully
    #[error("{script:?} exited with {status}: {stderr}")]
    Failed {
        /// Script path
        script: PathBuf,
        /// Exit status description
        status: String,
        /// Captured standard error, trimmed
        stderr: String,
    },
}

/// Operations on the external setup script
pub trait ScriptRunner: Send {
    /// Bind the requested devices to the user-space driver for the target
    /// user and allocate huge pages.
    fn prepare(&mut self, req: &PrepareRequest) -> Result<(), ScriptError>;

    /// Return every device to its kernel driver.
    fn reset(&mut self) -> Result<(), ScriptError>;
}

/// Runs the setup shell script
///
/// Prepare passes its parameters as environment variables (`PATH`,
/// `NRHUGE`, `TARGET_USER`, `PCI_ALLOWED`, `PCI_BLOCKED`); lists are space
/// separated. Reset runs the script with the single argument `reset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupScript {
    path: PathBuf,
    nr_hugepages: u32,
}

impl Default for SetupScript {
    fn default() -> Self {
        Self::new(DEFAULT_SETUP_SCRIPT)
    }
}

impl SetupScript {
    /// Runner for the script at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            nr_hugepages: DEFAULT_NR_HUGEPAGES,
        }
    }

    /// Huge pages to allocate when the request does not say.
    pub fn with_nr_hugepages(mut self, nr_hugepages: u32) -> Self {
        self.nr_hugepages = nr_hugepages;
        self
    }

    /// Environment passed to the script for `req`.
    pub fn prepare_env(&self, req: &PrepareRequest) -> Vec<(&'static str, String)> {
        vec![
            ("PATH", search_path()),
            (
                "NRHUGE",
                req.hugepage_count.unwrap_or(self.nr_hugepages).to_string(),
            ),
            ("TARGET_USER", req.target_user.clone()),
            ("PCI_ALLOWED", req.pci_allow_list.join(" ")),
            ("PCI_BLOCKED", req.pci_block_list.join(" ")),
        ]
    }

    fn run(&self, mut cmd: Command) -> Result<(), ScriptError> {
        let Output { status, stderr, .. } = cmd.output().map_err(|source| ScriptError::Spawn {
            script: self.path.clone(),
            source,
        })?;

        if !status.success() {
            return Err(ScriptError::Failed {
                script: self.path.clone(),
                status: status.to_string(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

fn search_path() -> String {
    std::env::var("PATH").unwrap_or_else(|_| DEFAULT_SEARCH_PATH.to_string())
}

impl ScriptRunner for SetupScript {
    fn prepare(&mut self, req: &PrepareRequest) -> Result<(), ScriptError> {
        let env = self.prepare_env(req);
        debug!(script = %self.path.display(), ?env, "running setup script");

        let mut cmd = Command::new(&self.path);
        cmd.env_clear().envs(env);
        self.run(cmd)?;

        info!(
            allowed = req.pci_allow_list.len(),
            blocked = req.pci_block_list.len(),
            "devices prepared"
        );
        Ok(())
    }

    fn reset(&mut self) -> Result<(), ScriptError> {
        debug!(script = %self.path.display(), "running setup script reset");

        let mut cmd = Command::new(&self.path);
        cmd.env_clear().env("PATH", search_path()).arg("reset");
        self.run(cmd)?;

        info!("devices returned to kernel drivers");
        Ok(())
    }
}

pub mod mock {
    //! Script runner that records requests instead of spawning.

    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    /// Call observed by [`RecordingScript`]
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum ScriptCall {
        /// `prepare` with the request passed
        Prepare(PrepareRequest),
        /// `reset`
        Reset,
    }

    #[derive(Debug, Default)]
    struct ScriptState {
        calls: Vec<ScriptCall>,
        fail_prepare_at: Option<usize>,
        fail_reset: bool,
    }

    /// In-memory [`ScriptRunner`]; clones share state
    #[derive(Debug, Clone, Default)]
    pub struct RecordingScript {
        state: Arc<Mutex<ScriptState>>,
    }

    impl RecordingScript {
        /// Create a recorder that always succeeds.
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail the `n`th prepare call (0-based).
        pub fn fail_prepare_at(self, n: usize) -> Self {
            self.state.lock().fail_prepare_at = Some(n);
            self
        }

        /// Make `reset` fail.
        pub fn fail_reset(self) -> Self {
            self.state.lock().fail_reset = true;
            self
        }

        /// Calls observed so far.
        pub fn calls(&self) -> Vec<ScriptCall> {
            self.state.lock().calls.clone()
        }

        /// Requests passed to `prepare`, in order.
        pub fn prepare_requests(&self) -> Vec<PrepareRequest> {
            self.state
                .lock()
                .calls
                .iter()
                .filter_map(|c| match c {
                    ScriptCall::Prepare(req) => Some(req.clone()),
                    ScriptCall::Reset => None,
                })
                .collect()
        }

        fn failure(stderr: &str) -> ScriptError {
            ScriptError::Failed {
                script: PathBuf::from("setup.sh"),
                status: "exit status: 1".to_string(),
                stderr: stderr.to_string(),
            }
        }
    }

    impl ScriptRunner for RecordingScript {
        fn prepare(&mut self, req: &PrepareRequest) -> Result<(), ScriptError> {
            let mut state = self.state.lock();
            let n = state
                .calls
                .iter()
                .filter(|c| matches!(c, ScriptCall::Prepare(_)))
                .count();
            state.calls.push(ScriptCall::Prepare(req.clone()));
            if state.fail_prepare_at == Some(n) {
                return Err(Self::failure("prepare refused"));
            }
            Ok(())
        }

        fn reset(&mut self) -> Result<(), ScriptError> {
            let mut state = self.state.lock();
            state.calls.push(ScriptCall::Reset);
            if state.fail_reset {
                return Err(Self::failure("reset refused"));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_env() {
        let script = SetupScript::new("/opt/setup.sh").with_nr_hugepages(512);
        let req = PrepareRequest {
            target_user: "storage".to_string(),
            pci_allow_list: vec!["0000:81:00.0".to_string(), "0000:82:00.0".to_string()],
            pci_block_list: vec!["0000:83:00.0".to_string()],
            ..PrepareRequest::default()
        };

        let env = script.prepare_env(&req);
        let get = |key: &str| {
            env.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("NRHUGE"), Some("512"));
        assert_eq!(get("TARGET_USER"), Some("storage"));
        assert_eq!(get("PCI_ALLOWED"), Some("0000:81:00.0 0000:82:00.0"));
        assert_eq!(get("PCI_BLOCKED"), Some("0000:83:00.0"));
        assert!(get("PATH").is_some());
    }

    #[test]
    fn test_request_hugepage_count_wins() {
        let script = SetupScript::default();
        let req = PrepareRequest {
            hugepage_count: Some(64),
            ..PrepareRequest::default()
        };
        assert!(script.prepare_env(&req).contains(&("NRHUGE", "64".to_string())));
    }

    #[test]
    fn test_missing_script_is_spawn_error() {
        let mut script = SetupScript::new("/nonexistent/setup_spdk.sh");
        assert!(matches!(script.reset(), Err(ScriptError::Spawn { .. })));
    }
}
