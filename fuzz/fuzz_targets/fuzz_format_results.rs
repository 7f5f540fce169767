//! Fuzzes format result decoding and aggregation.
//!
//! The native shim returns format results as JSON. Whatever decodes must
//! aggregate without panicking, and every device in the input must appear
//! exactly once in the response.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_format_results
#![no_main]
use libfuzzer_sys::fuzz_target;
use storctl_bdev::format_resp_from_results;
use storctl_binding::FormatResult;

fuzz_target!(|data: &[u8]| {
    let Ok(results) = serde_json::from_slice::<Vec<FormatResult>>(data) else {
        return;
    };
    if let Ok(resp) = format_resp_from_results(&results) {
        for r in &results {
            assert!(resp.get(&r.ctrlr_pci_addr).is_some());
        }
    }
});
