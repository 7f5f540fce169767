//! Backend configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(feature = "native")]
use storctl_binding::NativeBinding;

#[cfg(feature = "native")]
use crate::error::{BdevError, BdevResult};
use crate::hugepages::{DEFAULT_HUGEPAGE_DIR, DEFAULT_HUGEPAGE_PREFIX, HugePageDir};
use crate::script::{DEFAULT_NR_HUGEPAGES, DEFAULT_SETUP_SCRIPT, SetupScript};

/// Errors raised while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("failed to read config {path:?}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Configuration is not valid YAML for this schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A value is out of range
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    fn invalid(msg: impl Into<String>) -> Self {
        ConfigError::Invalid(msg.into())
    }
}

/// Fixed paths and defaults used by the backend
///
/// Every key is optional in YAML; absent keys take the defaults below.
///
/// # Examples
///
/// ```
/// use storctl_bdev::BackendConfig;
///
/// let config = BackendConfig::from_yaml_str("nr_hugepages: 1024\ndisable_vmd: true\n")?;
/// assert_eq!(config.nr_hugepages, 1024);
/// assert!(config.disable_vmd);
/// assert_eq!(config.hugepage_prefix, "spdk");
/// # Ok::<(), storctl_bdev::config::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendConfig {
    /// hugetlbfs mount holding native environment memory files
    pub hugepage_dir: PathBuf,
    /// File name prefix of native environment huge-page files
    pub hugepage_prefix: String,
    /// Directory holding per-device lock files
    pub lock_file_dir: PathBuf,
    /// Setup script run by prepare and reset
    pub setup_script: PathBuf,
    /// Huge pages to allocate when a prepare request does not say
    pub nr_hugepages: u32,
    /// Disable VMD awareness for every operation
    pub disable_vmd: bool,
    /// Native shim library, when the native binding is used
    pub native_library: Option<PathBuf>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            hugepage_dir: PathBuf::from(DEFAULT_HUGEPAGE_DIR),
            hugepage_prefix: DEFAULT_HUGEPAGE_PREFIX.to_string(),
            lock_file_dir: PathBuf::from(storctl_binding::DEFAULT_LOCK_DIR),
            setup_script: PathBuf::from(DEFAULT_SETUP_SCRIPT),
            nr_hugepages: DEFAULT_NR_HUGEPAGES,
            disable_vmd: false,
            native_library: None,
        }
    }
}

impl BackendConfig {
    /// Parse and validate YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed YAML or unknown keys and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise
    /// as [`BackendConfig::from_yaml_str`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Serialize to YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if serialization fails.
    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.hugepage_dir.is_absolute() {
            return Err(ConfigError::invalid("hugepage_dir must be an absolute path"));
        }
        if self.hugepage_prefix.is_empty() {
            return Err(ConfigError::invalid("hugepage_prefix must not be empty"));
        }
        if !self.lock_file_dir.is_absolute() {
            return Err(ConfigError::invalid("lock_file_dir must be an absolute path"));
        }
        if self.setup_script.as_os_str().is_empty() {
            return Err(ConfigError::invalid("setup_script must not be empty"));
        }
        if self.nr_hugepages == 0 {
            return Err(ConfigError::invalid("nr_hugepages must be greater than 0"));
        }
        if matches!(&self.native_library, Some(p) if p.as_os_str().is_empty()) {
            return Err(ConfigError::invalid("native_library must not be empty"));
        }
        Ok(())
    }

    /// Huge-page cleaner for the configured directory and prefix.
    pub fn hugepage_dir(&self) -> HugePageDir {
        HugePageDir::new(self.hugepage_dir.clone(), self.hugepage_prefix.clone())
    }

    /// Setup script runner with the configured default huge-page count.
    pub fn setup_script(&self) -> SetupScript {
        SetupScript::new(self.setup_script.clone()).with_nr_hugepages(self.nr_hugepages)
    }

    /// Load the native binding from `native_library`, cleaning lock files
    /// under `lock_file_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`BdevError::Config`] when `native_library` is unset or the
    /// configuration is invalid, and [`BdevError::NativeLoad`] when the
    /// library cannot be loaded.
    #[cfg(feature = "native")]
    #[cfg_attr(docsrs, doc(cfg(feature = "native")))]
    pub fn native_binding(&self) -> BdevResult<NativeBinding> {
        self.validate()?;
        let Some(library) = &self.native_library else {
            return Err(ConfigError::invalid("native_library is not set").into());
        };
        NativeBinding::load(library, self.lock_file_dir.clone()).map_err(BdevError::NativeLoad)
    }
}
