//! Snapshot tests for user-visible response and error text.

use insta::assert_snapshot;
use storctl_bdev::vmd::VmdError;
use storctl_bdev::{BdevError, FormatResponse, format_resp_from_results};
use storctl_binding::{BindingError, FormatResult};

fn aggregated() -> FormatResponse {
    format_resp_from_results(&[
        FormatResult::ok("0000:81:00.0", 1),
        FormatResult::failed("0000:81:00.0", 2, "x"),
        FormatResult::failed("0000:81:00.0", 3, "y"),
        FormatResult::ok("0000:82:00.0", 1),
    ])
    .unwrap_or_default()
}

#[test]
fn test_format_response_json() -> Result<(), serde_json::Error> {
    assert_snapshot!(
        serde_json::to_string(&aggregated())?,
        @r#"{"device_responses":{"0000:81:00.0":{"formatted":false,"error":{"fault":"format_failure","pci_addr":"0000:81:00.0","failed_namespaces":[2,3],"cause":"namespace 2: x"}},"0000:82:00.0":{"formatted":true}}}"#
    );
    Ok(())
}

#[test]
fn test_format_fault_report() {
    let report = aggregated()
        .faults()
        .map(|f| f.report())
        .collect::<Vec<_>>()
        .join("\n");
    assert_snapshot!(
        report,
        @"bdev-2004: NVMe format failed on 0000:81:00.0: failed to format namespaces [2 3] (namespace 2: x) (resolution: check the health of the listed namespaces and retry the format)"
    );
}

#[test]
fn test_phase_errors() {
    assert_snapshot!(
        BdevError::EnvInit(BindingError::EnvInit { rc: -19 }).to_string(),
        @"failed to init native env: environment init failed (rc=-19)"
    );
    assert_snapshot!(
        BdevError::VmdDetect(VmdError::Parse { output: "garbage".to_string() }).to_string(),
        @r#"VMD could not be enabled: error parsing cmd output: "garbage""#
    );
    assert_snapshot!(
        BdevError::EmptyDeviceList.to_string(),
        @"empty pci address list in nvme format request"
    );
}
