//! Fault codes and the user-facing [`Fault`] type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Subsystem a fault code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultDomain {
    /// Block-device (bdev) storage faults
    Bdev,
}

impl fmt::Display for FaultDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultDomain::Bdev => write!(f, "bdev"),
        }
    }
}

/// Stable numeric fault codes.
///
/// Values are part of the external contract and must never be renumbered.
///
/// # Examples
///
/// ```
/// use storctl_errors::FaultCode;
///
/// assert_eq!(FaultCode::BdevPciAddrNotFound.code(), 2003);
/// assert_eq!(FaultCode::from_code(2001), Some(FaultCode::BdevUnknownClass));
/// assert_eq!(FaultCode::BdevFormatFailure.to_string(), "bdev-2004");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum FaultCode {
    /// Requested bdev class is not one of the supported classes
    BdevUnknownClass = 2001,
    /// PCI address missing or malformed
    BdevBadPciAddr = 2002,
    /// PCI address not visible to the native environment
    BdevPciAddrNotFound = 2003,
    /// One or more namespaces on a device failed to format
    BdevFormatFailure = 2004,
}

impl FaultCode {
    /// Get the numeric code.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Domain the code belongs to.
    pub fn domain(self) -> FaultDomain {
        FaultDomain::Bdev
    }

    /// Look up a code by its numeric value.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            2001 => Some(FaultCode::BdevUnknownClass),
            2002 => Some(FaultCode::BdevBadPciAddr),
            2003 => Some(FaultCode::BdevPciAddrNotFound),
            2004 => Some(FaultCode::BdevFormatFailure),
            _ => None,
        }
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.domain(), self.code())
    }
}

/// Display adapter rendering namespace ids as a space separated bracketed
/// list, e.g. `[2 3]`.
#[derive(Debug, Clone, Copy)]
pub struct NamespaceList<'a>(pub &'a [u32]);

impl fmt::Display for NamespaceList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{id}")?;
        }
        write!(f, "]")
    }
}

/// User-facing fault raised by the block-device backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "fault", rename_all = "snake_case")]
pub enum Fault {
    /// Unknown bdev class
    #[error("unknown bdev class {class:?}")]
    UnknownClass {
        /// Class name as supplied by the caller
        class: String,
    },

    /// Missing or malformed PCI address
    #[error("bad PCI address {pci_addr:?}")]
    BadPciAddr {
        /// Address as supplied by the caller
        pci_addr: String,
    },

    /// PCI address not found among discovered controllers
    #[error("PCI address {pci_addr} not found")]
    PciAddrNotFound {
        /// Address that was requested
        pci_addr: String,
    },

    /// Namespace format failure on a single device
    #[error(
        "NVMe format failed on {pci_addr}: failed to format namespaces {} ({cause})",
        NamespaceList(.failed_namespaces)
    )]
    FormatFailure {
        /// Controller PCI address
        pci_addr: String,
        /// Ids of every namespace that failed, ascending
        failed_namespaces: Vec<u32>,
        /// Error reported for the lowest failing namespace
        cause: String,
    },
}

impl Fault {
    /// Create an unknown bdev class fault.
    pub fn unknown_class(class: impl Into<String>) -> Self {
        Fault::UnknownClass {
            class: class.into(),
        }
    }

    /// Create a bad PCI address fault.
    pub fn bad_pci_addr(pci_addr: impl Into<String>) -> Self {
        Fault::BadPciAddr {
            pci_addr: pci_addr.into(),
        }
    }

    /// Create a PCI address not found fault.
    pub fn pci_addr_not_found(pci_addr: impl Into<String>) -> Self {
        Fault::PciAddrNotFound {
            pci_addr: pci_addr.into(),
        }
    }

    /// Create a format failure fault.
    pub fn format_failure(
        pci_addr: impl Into<String>,
        failed_namespaces: Vec<u32>,
        cause: impl Into<String>,
    ) -> Self {
        Fault::FormatFailure {
            pci_addr: pci_addr.into(),
            failed_namespaces,
            cause: cause.into(),
        }
    }

    /// Stable code identifying the fault.
    pub fn code(&self) -> FaultCode {
        match self {
            Fault::UnknownClass { .. } => FaultCode::BdevUnknownClass,
            Fault::BadPciAddr { .. } => FaultCode::BdevBadPciAddr,
            Fault::PciAddrNotFound { .. } => FaultCode::BdevPciAddrNotFound,
            Fault::FormatFailure { .. } => FaultCode::BdevFormatFailure,
        }
    }

    /// Operator hint describing how to resolve the fault.
    pub fn resolution(&self) -> &'static str {
        match self {
            Fault::UnknownClass { .. } => {
                "set the bdev class to one of: nvme, kdev, file, malloc"
            }
            Fault::BadPciAddr { .. } => {
                "supply a PCI address in the form DDDD:BB:DD.F, e.g. 0000:5d:00.0"
            }
            Fault::PciAddrNotFound { .. } => {
                "run prepare to bind the device to the user-space driver and check the allow list"
            }
            Fault::FormatFailure { .. } => {
                "check the health of the listed namespaces and retry the format"
            }
        }
    }

    /// PCI address the fault refers to, if any.
    pub fn pci_addr(&self) -> Option<&str> {
        match self {
            Fault::UnknownClass { .. } => None,
            Fault::BadPciAddr { pci_addr }
            | Fault::PciAddrNotFound { pci_addr }
            | Fault::FormatFailure { pci_addr, .. } => Some(pci_addr),
        }
    }

    /// Full report line: code, message and resolution.
    pub fn report(&self) -> String {
        format!("{}: {} (resolution: {})", self.code(), self, self.resolution())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip() {
        for code in [2001u16, 2002, 2003, 2004] {
            assert_eq!(FaultCode::from_code(code).map(FaultCode::code), Some(code));
        }
        assert_eq!(FaultCode::from_code(42), None);
    }

    #[test]
    fn test_namespace_list_display() {
        assert_eq!(NamespaceList(&[]).to_string(), "[]");
        assert_eq!(NamespaceList(&[7]).to_string(), "[7]");
        assert_eq!(NamespaceList(&[2, 3]).to_string(), "[2 3]");
    }

    #[test]
    fn test_fault_codes() {
        assert_eq!(Fault::unknown_class("aio").code(), FaultCode::BdevUnknownClass);
        assert_eq!(Fault::bad_pci_addr("").code(), FaultCode::BdevBadPciAddr);
        assert_eq!(
            Fault::pci_addr_not_found("0000:01:00.0").code(),
            FaultCode::BdevPciAddrNotFound
        );
        assert_eq!(
            Fault::format_failure("0000:01:00.0", vec![1], "x").code(),
            FaultCode::BdevFormatFailure
        );
    }

    #[test]
    fn test_fault_pci_addr() {
        assert_eq!(Fault::unknown_class("aio").pci_addr(), None);
        assert_eq!(
            Fault::pci_addr_not_found("0000:01:00.0").pci_addr(),
            Some("0000:01:00.0")
        );
    }

    #[test]
    fn test_fault_is_std_error() {
        let err = Fault::bad_pci_addr("");
        let _: &dyn std::error::Error = &err;
    }
}
