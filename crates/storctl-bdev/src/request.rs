//! Request and response types for backend operations.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use storctl_binding::Controller;
use storctl_errors::Fault;

/// Backing type of a block device
///
/// Parsing any other name yields [`Fault::UnknownClass`].
///
/// # Examples
///
/// ```
/// use storctl_bdev::BdevClass;
///
/// assert_eq!("nvme".parse::<BdevClass>(), Ok(BdevClass::Nvme));
/// assert!("aio".parse::<BdevClass>().is_err());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BdevClass {
    /// Native NVMe device
    #[default]
    Nvme,
    /// Kernel block device passthrough
    Kdev,
    /// Plain file
    File,
    /// In-memory device
    Malloc,
}

impl BdevClass {
    /// Lower-case name of the class.
    pub fn as_str(self) -> &'static str {
        match self {
            BdevClass::Nvme => "nvme",
            BdevClass::Kdev => "kdev",
            BdevClass::File => "file",
            BdevClass::Malloc => "malloc",
        }
    }

    /// Whether formatting the class needs the native environment.
    pub fn is_native(self) -> bool {
        matches!(self, BdevClass::Nvme)
    }
}

impl fmt::Display for BdevClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BdevClass {
    type Err = Fault;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nvme" => Ok(BdevClass::Nvme),
            "kdev" => Ok(BdevClass::Kdev),
            "file" => Ok(BdevClass::File),
            "malloc" => Ok(BdevClass::Malloc),
            other => Err(Fault::unknown_class(other)),
        }
    }
}

impl TryFrom<String> for BdevClass {
    type Error = Fault;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BdevClass> for String {
    fn from(class: BdevClass) -> Self {
        class.as_str().to_string()
    }
}

/// Scan request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanRequest {
    /// Restrict discovery to these PCI addresses (empty = all)
    pub device_list: Vec<String>,
    /// Disable VMD enumeration for this scan
    pub disable_vmd: bool,
}

/// Scan response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResponse {
    /// Discovered controllers
    pub controllers: Vec<Controller>,
}

/// Format request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatRequest {
    /// Backing type of the devices
    pub class: BdevClass,
    /// Devices to format
    #[serde(default)]
    pub device_list: Vec<String>,
    /// DMA memory hint for the native environment, in MiB
    #[serde(default)]
    pub mem_size_mb: Option<u32>,
    /// Disable VMD enumeration for this format
    #[serde(default)]
    pub disable_vmd: bool,
}

impl FormatRequest {
    /// Request formatting `devices` of `class`.
    pub fn new(class: BdevClass, devices: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            class,
            device_list: devices.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// Format outcome for one device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFormatResponse {
    /// Every namespace formatted cleanly
    pub formatted: bool,
    /// Fault describing failed namespaces
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Fault>,
}

/// Format response keyed by PCI address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatResponse {
    /// Per-device outcome
    pub device_responses: BTreeMap<String, DeviceFormatResponse>,
}

impl FormatResponse {
    /// Outcome for one device.
    pub fn get(&self, pci_addr: &str) -> Option<&DeviceFormatResponse> {
        self.device_responses.get(pci_addr)
    }

    /// Number of devices in the response.
    pub fn len(&self) -> usize {
        self.device_responses.len()
    }

    /// Whether the response is empty.
    pub fn is_empty(&self) -> bool {
        self.device_responses.is_empty()
    }

    /// Whether every device formatted cleanly.
    pub fn all_formatted(&self) -> bool {
        self.device_responses.values().all(|r| r.formatted)
    }

    /// Faults for devices that failed, in address order.
    pub fn faults(&self) -> impl Iterator<Item = &Fault> {
        self.device_responses
            .values()
            .filter_map(|r| r.error.as_ref())
    }
}

/// Prepare request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepareRequest {
    /// OS user that will own the devices and huge pages
    pub target_user: String,
    /// Devices to bind to the user-space driver (empty = all)
    pub pci_allow_list: Vec<String>,
    /// Devices to leave with the kernel driver
    pub pci_block_list: Vec<String>,
    /// Huge pages to allocate (`None` = configured default)
    pub hugepage_count: Option<u32>,
    /// Skip VMD detection and re-prepare
    pub disable_vmd: bool,
    /// Skip reclaiming stale huge-page files
    pub disable_clean_hugepages: bool,
}

impl PrepareRequest {
    /// Prepare devices for `target_user`.
    pub fn for_user(target_user: impl Into<String>) -> Self {
        Self {
            target_user: target_user.into(),
            ..Self::default()
        }
    }
}

/// Prepare response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareResponse {
    /// VMD bridges were found and re-prepared
    pub vmd_detected: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use storctl_errors::FaultCode;

    #[test]
    fn test_class_roundtrip() {
        for class in [BdevClass::Nvme, BdevClass::Kdev, BdevClass::File, BdevClass::Malloc] {
            assert_eq!(class.as_str().parse::<BdevClass>(), Ok(class));
        }
    }

    #[test]
    fn test_unknown_class_fault() {
        let err = "NVMe".parse::<BdevClass>().err();
        assert_eq!(err.map(|f| f.code()), Some(FaultCode::BdevUnknownClass));
    }

    #[test]
    fn test_class_serde() -> Result<(), serde_json::Error> {
        let req: FormatRequest = serde_json::from_str(r#"{"class":"malloc","device_list":["/dev/pmem0"]}"#)?;
        assert_eq!(req.class, BdevClass::Malloc);

        let bad = serde_json::from_str::<FormatRequest>(r#"{"class":"aio"}"#);
        let msg = bad.err().map(|e| e.to_string()).unwrap_or_default();
        assert!(msg.contains("unknown bdev class \"aio\""), "{msg}");
        Ok(())
    }

    #[test]
    fn test_format_response_helpers() {
        let mut resp = FormatResponse::default();
        resp.device_responses.insert(
            "0000:81:00.0".to_string(),
            DeviceFormatResponse {
                formatted: true,
                error: None,
            },
        );
        assert!(resp.all_formatted());
        assert_eq!(resp.faults().count(), 0);

        resp.device_responses.insert(
            "0000:82:00.0".to_string(),
            DeviceFormatResponse {
                formatted: false,
                error: Some(Fault::format_failure("0000:82:00.0", vec![1], "namespace 1: x")),
            },
        );
        assert!(!resp.all_formatted());
        assert_eq!(resp.faults().count(), 1);
        assert_eq!(resp.len(), 2);
    }
}
