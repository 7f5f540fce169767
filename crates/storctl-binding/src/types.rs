//! Value types exchanged with the binding

use serde::{Deserialize, Serialize};

use crate::error::{BindingError, BindingResult};
use crate::pci::is_valid_pci_address;

/// NVMe namespace on a controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    /// Namespace id
    pub id: u32,
    /// Capacity in bytes
    pub size: u64,
}

/// Discovered NVMe controller
///
/// Identity is the PCI address. Metadata fields are reported as-is by the
/// native layer and are opaque to the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Controller {
    /// PCI address, e.g. `0000:81:00.0`
    pub pci_addr: String,
    /// Model number
    #[serde(default)]
    pub model: String,
    /// Serial number
    #[serde(default)]
    pub serial: String,
    /// Firmware revision
    #[serde(default)]
    pub fw_rev: String,
    /// PCI vendor id
    #[serde(default)]
    pub vendor_id: String,
    /// NUMA socket the controller is attached to
    #[serde(default)]
    pub socket_id: i32,
    /// Namespaces on the controller
    #[serde(default)]
    pub namespaces: Vec<Namespace>,
    /// Whether the controller sits behind a VMD bridge
    #[serde(default)]
    pub vmd_backed: bool,
}

impl Controller {
    /// Create a controller with only its address set.
    pub fn new(pci_addr: impl Into<String>) -> Self {
        Self {
            pci_addr: pci_addr.into(),
            ..Self::default()
        }
    }

    /// Add a namespace.
    pub fn with_namespace(mut self, id: u32, size: u64) -> Self {
        self.namespaces.push(Namespace { id, size });
        self
    }

    /// Mark the controller as VMD backed.
    pub fn vmd_backed(mut self) -> Self {
        self.vmd_backed = true;
        self
    }

    /// Namespace ids in discovery order.
    pub fn namespace_ids(&self) -> Vec<u32> {
        self.namespaces.iter().map(|ns| ns.id).collect()
    }

    /// Total capacity across all namespaces.
    pub fn total_bytes(&self) -> u64 {
        self.namespaces
            .iter()
            .fold(0u64, |acc, ns| acc.saturating_add(ns.size))
    }
}

/// Outcome of formatting one namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatResult {
    /// Controller PCI address
    pub ctrlr_pci_addr: String,
    /// Namespace id
    pub ns_id: u32,
    /// Error message, `None` on success
    #[serde(default)]
    pub error: Option<String>,
}

impl FormatResult {
    /// Successful namespace format.
    pub fn ok(ctrlr_pci_addr: impl Into<String>, ns_id: u32) -> Self {
        Self {
            ctrlr_pci_addr: ctrlr_pci_addr.into(),
            ns_id,
            error: None,
        }
    }

    /// Failed namespace format.
    pub fn failed(ctrlr_pci_addr: impl Into<String>, ns_id: u32, error: impl Into<String>) -> Self {
        Self {
            ctrlr_pci_addr: ctrlr_pci_addr.into(),
            ns_id,
            error: Some(error.into()),
        }
    }

    /// Whether the namespace formatted cleanly.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Environment-scope options
///
/// These apply to a whole init/fini bracket, never to individual calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvOptions {
    /// Restrict the environment to these PCI addresses (empty = all)
    #[serde(default)]
    pub pci_include_list: Vec<String>,
    /// DMA memory to reserve in MiB (`None` = framework default)
    #[serde(default)]
    pub mem_size_mb: Option<u32>,
    /// Disable VMD bridge enumeration
    #[serde(default)]
    pub disable_vmd: bool,
}

impl EnvOptions {
    /// Options restricted to the given addresses.
    pub fn with_include_list(mut self, addrs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.pci_include_list = addrs.into_iter().map(Into::into).collect();
        self
    }

    /// Set the memory size hint.
    pub fn with_mem_size_mb(mut self, mem_size_mb: u32) -> Self {
        self.mem_size_mb = Some(mem_size_mb);
        self
    }

    /// Set the VMD switch.
    pub fn with_vmd_disabled(mut self, disable_vmd: bool) -> Self {
        self.disable_vmd = disable_vmd;
        self
    }

    /// Validate the options.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::InvalidPciAddress`] for the first include-list
    /// entry that is not a PCI address.
    pub fn validate(&self) -> BindingResult<()> {
        match self
            .pci_include_list
            .iter()
            .find(|addr| !is_valid_pci_address(addr))
        {
            Some(bad) => Err(BindingError::InvalidPciAddress(bad.clone())),
            None => Ok(()),
        }
    }

    /// Whether the include list admits `pci_addr`.
    pub fn includes(&self, pci_addr: &str) -> bool {
        self.pci_include_list.is_empty() || self.pci_include_list.iter().any(|a| a == pci_addr)
    }
}
