//! Aggregation of per-namespace format results into per-device responses.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use storctl_binding::FormatResult;
use storctl_errors::Fault;
use tracing::debug;

use crate::error::{BdevError, BdevResult};
use crate::request::{DeviceFormatResponse, FormatResponse};

/// Fold raw namespace results into one response entry per device.
///
/// Namespaces are visited in ascending id order. A device with any failed
/// namespace gets a [`Fault::FormatFailure`] naming every failed namespace,
/// with the error of the lowest failed namespace as the cause. A device
/// with none is marked formatted.
///
/// # Errors
///
/// Returns [`BdevError::DuplicateNamespaceResult`] if the same
/// (device, namespace) pair appears twice.
pub fn format_resp_from_results(results: &[FormatResult]) -> BdevResult<FormatResponse> {
    let mut by_device: BTreeMap<&str, BTreeMap<u32, Option<&str>>> = BTreeMap::new();

    for result in results {
        let namespaces = by_device.entry(result.ctrlr_pci_addr.as_str()).or_default();
        match namespaces.entry(result.ns_id) {
            Entry::Occupied(_) => {
                return Err(BdevError::DuplicateNamespaceResult {
                    pci_addr: result.ctrlr_pci_addr.clone(),
                    ns_id: result.ns_id,
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(result.error.as_deref());
            }
        }
    }

    let mut resp = FormatResponse::default();
    for (addr, namespaces) in by_device {
        let mut formatted = Vec::new();
        let mut failed = Vec::new();
        let mut first_err = None;

        for (ns_id, err) in namespaces {
            match err {
                Some(err) => {
                    failed.push(ns_id);
                    if first_err.is_none() {
                        first_err = Some(format!("namespace {ns_id}: {err}"));
                    }
                }
                None => formatted.push(ns_id),
            }
        }

        debug!(pci_addr = addr, ?formatted, ?failed, "namespace format results");

        let device = match first_err {
            Some(cause) => DeviceFormatResponse {
                formatted: false,
                error: Some(Fault::format_failure(addr, failed, cause)),
            },
            None => DeviceFormatResponse {
                formatted: true,
                error: None,
            },
        };
        resp.device_responses.insert(addr.to_string(), device);
    }

    Ok(resp)
}

/// Response for a class that needs no native formatting: every device is
/// present, unformatted and without fault.
pub fn skipped_format_response(devices: &[String]) -> FormatResponse {
    FormatResponse {
        device_responses: devices
            .iter()
            .map(|dev| (dev.clone(), DeviceFormatResponse::default()))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowest_failure_is_cause() -> BdevResult<()> {
        let results = vec![
            FormatResult::failed("0000:81:00.0", 3, "y"),
            FormatResult::ok("0000:81:00.0", 1),
            FormatResult::failed("0000:81:00.0", 2, "x"),
        ];
        let resp = format_resp_from_results(&results)?;

        let device = resp.get("0000:81:00.0");
        assert_eq!(
            device.and_then(|d| d.error.clone()),
            Some(Fault::format_failure("0000:81:00.0", vec![2, 3], "namespace 2: x"))
        );
        assert_eq!(device.map(|d| d.formatted), Some(false));
        Ok(())
    }

    #[test]
    fn test_duplicate_rejected() {
        let results = vec![
            FormatResult::ok("0000:81:00.0", 1),
            FormatResult::failed("0000:81:00.0", 1, "x"),
        ];
        assert!(matches!(
            format_resp_from_results(&results),
            Err(BdevError::DuplicateNamespaceResult { ns_id: 1, .. })
        ));
    }

    #[test]
    fn test_same_namespace_on_different_devices() -> BdevResult<()> {
        let results = vec![
            FormatResult::ok("0000:81:00.0", 1),
            FormatResult::ok("0000:82:00.0", 1),
        ];
        let resp = format_resp_from_results(&results)?;
        assert_eq!(resp.len(), 2);
        assert!(resp.all_formatted());
        Ok(())
    }

    #[test]
    fn test_skipped_response() {
        let resp = skipped_format_response(&["/dev/sda".to_string(), "/tmp/f".to_string()]);
        assert_eq!(resp.len(), 2);
        assert!(resp.device_responses.values().all(|d| !d.formatted && d.error.is_none()));
    }
}
