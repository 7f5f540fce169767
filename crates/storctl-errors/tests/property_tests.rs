//! Property-based tests for fault formatting.

use proptest::prelude::*;
use storctl_errors::{Fault, FaultCode, NamespaceList};

proptest! {
    #[test]
    fn test_unknown_code_rejected(code in 0u16..2001) {
        prop_assert_eq!(FaultCode::from_code(code), None);
    }

    #[test]
    fn test_format_failure_lists_every_namespace(
        ids in prop::collection::btree_set(1u32..1024, 1..16),
        cause in "[a-z ]{1,32}",
    ) {
        let ids: Vec<u32> = ids.into_iter().collect();
        let fault = Fault::format_failure("0000:5d:00.0", ids.clone(), cause.clone());
        let msg = fault.to_string();
        prop_assert!(msg.contains(&NamespaceList(&ids).to_string()));
        prop_assert!(msg.contains(&cause));
    }

    #[test]
    fn test_not_found_mentions_address(addr in "[0-9a-f]{4}:[0-9a-f]{2}:[0-9a-f]{2}\\.[0-7]") {
        let fault = Fault::pci_addr_not_found(&addr);
        prop_assert!(fault.to_string().contains(&addr));
        prop_assert_eq!(fault.pci_addr(), Some(addr.as_str()));
    }
}
