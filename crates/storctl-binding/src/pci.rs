//! PCI address helpers.
//!
//! Addresses are accepted in `DDDD:BB:DD.F` form or the short `BB:DD.F`
//! form that `lspci` prints when every device lives in domain 0. Devices
//! behind a VMD bridge use a wider domain (e.g. `5d0505:01:00.0`), so the
//! domain may be 4 to 8 hex digits.

/// Domain prefix assumed for short-form addresses.
pub const PCI_DEFAULT_DOMAIN: &str = "0000";

fn is_hex_field(field: &str, min: usize, max: usize) -> bool {
    (min..=max).contains(&field.len()) && field.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Check whether `addr` is a well-formed PCI address.
///
/// # Examples
///
/// ```
/// use storctl_binding::is_valid_pci_address;
///
/// assert!(is_valid_pci_address("0000:5d:00.0"));
/// assert!(is_valid_pci_address("5d:00.0"));
/// assert!(is_valid_pci_address("5d0505:01:00.0"));
/// assert!(!is_valid_pci_address("0000:5d:00.8"));
/// assert!(!is_valid_pci_address(""));
/// ```
pub fn is_valid_pci_address(addr: &str) -> bool {
    let Some((rest, function)) = addr.rsplit_once('.') else {
        return false;
    };
    if function.len() != 1 || !matches!(function.as_bytes().first(), Some(b'0'..=b'7')) {
        return false;
    }

    let fields: Vec<&str> = rest.split(':').collect();
    match fields.as_slice() {
        [bus, device] => is_hex_field(bus, 2, 2) && is_hex_field(device, 2, 2),
        [domain, bus, device] => {
            is_hex_field(domain, 4, 8) && is_hex_field(bus, 2, 2) && is_hex_field(device, 2, 2)
        }
        _ => false,
    }
}

/// Return `addr` with the default domain prepended when it is missing.
///
/// # Examples
///
/// ```
/// use storctl_binding::with_domain;
///
/// assert_eq!(with_domain("5d:05.5"), "0000:5d:05.5");
/// assert_eq!(with_domain("0000:5d:05.5"), "0000:5d:05.5");
/// ```
pub fn with_domain(addr: &str) -> String {
    if addr.matches(':').count() >= 2 {
        addr.to_string()
    } else {
        format!("{PCI_DEFAULT_DOMAIN}:{addr}")
    }
}
