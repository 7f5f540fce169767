//! Unit tests for lock files and the scripted binding.

use std::path::Path;

use storctl_binding::prelude::*;
use storctl_binding::{lock_file_path, remove_lock_files};
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

mod lock_file_tests {
    use super::*;

    #[test]
    fn test_removes_existing_lock_files() -> TestResult {
        let dir = TempDir::new()?;
        let addrs = vec!["0000:81:00.0".to_string(), "0000:82:00.0".to_string()];
        for addr in &addrs {
            std::fs::write(lock_file_path(dir.path(), addr), b"")?;
        }

        remove_lock_files(dir.path(), &addrs)?;

        for addr in &addrs {
            assert!(!lock_file_path(dir.path(), addr).exists());
        }
        Ok(())
    }

    #[test]
    fn test_missing_lock_files_are_ignored() -> TestResult {
        let dir = TempDir::new()?;
        remove_lock_files(dir.path(), &["0000:81:00.0".to_string()])?;
        Ok(())
    }

    #[test]
    fn test_unrelated_files_untouched() -> TestResult {
        let dir = TempDir::new()?;
        let other = dir.path().join("spdk_pci_lock_0000:99:00.0");
        std::fs::write(&other, b"")?;

        remove_lock_files(dir.path(), &["0000:81:00.0".to_string()])?;

        assert!(other.exists());
        Ok(())
    }

    #[test]
    fn test_failure_reported_after_trying_all() -> TestResult {
        let dir = TempDir::new()?;
        // A directory in place of the first lock file cannot be removed
        // with remove_file.
        std::fs::create_dir(lock_file_path(dir.path(), "0000:81:00.0"))?;
        std::fs::write(lock_file_path(dir.path(), "0000:82:00.0"), b"")?;

        let result = remove_lock_files(
            dir.path(),
            &["0000:81:00.0".to_string(), "0000:82:00.0".to_string()],
        );

        match result {
            Err(BindingError::LockFile { path, .. }) => {
                assert_eq!(path, lock_file_path(dir.path(), "0000:81:00.0"));
            }
            other => return Err(format!("unexpected result: {other:?}").into()),
        }
        assert!(!lock_file_path(dir.path(), "0000:82:00.0").exists());
        Ok(())
    }
}

mod mock_binding_tests {
    use super::*;

    fn two_controllers() -> Vec<Controller> {
        vec![
            Controller::new("0000:81:00.0").with_namespace(1, 1 << 30),
            Controller::new("0000:82:00.0")
                .with_namespace(1, 1 << 30)
                .with_namespace(2, 1 << 30),
        ]
    }

    #[test]
    fn test_discover_respects_include_list() -> TestResult {
        let mut binding = MockBinding::new().with_controllers(two_controllers());
        let opts = EnvOptions::default().with_include_list(["0000:82:00.0"]);

        let session = EnvSession::start(&mut binding, &opts);
        let ctrlrs = session?.discover()?;

        assert_eq!(ctrlrs.len(), 1);
        assert_eq!(ctrlrs.first().map(|c| c.pci_addr.as_str()), Some("0000:82:00.0"));
        Ok(())
    }

    #[test]
    fn test_scripted_format_results_returned_verbatim() -> TestResult {
        let scripted = vec![
            FormatResult::ok("0000:81:00.0", 1),
            FormatResult::failed("0000:81:00.0", 2, "media error"),
        ];
        let mut binding = MockBinding::new()
            .with_controllers(two_controllers())
            .with_format_results(scripted.clone());

        let results = EnvSession::start(&mut binding, &EnvOptions::default())?.format()?;
        assert_eq!(results, scripted);
        Ok(())
    }

    #[test]
    fn test_update_recorded() -> TestResult {
        let mut binding = MockBinding::new().with_controllers(two_controllers());
        let handle = binding.clone();

        EnvSession::start(&mut binding, &EnvOptions::default())?.update(
            "0000:81:00.0",
            Path::new("/fw/image.bin"),
            2,
        )?;

        assert!(handle.calls().contains(&BindingCall::Update {
            pci_addr: "0000:81:00.0".to_string(),
            firmware: "/fw/image.bin".into(),
            slot: 2,
        }));
        Ok(())
    }

    #[test]
    fn test_scripted_failures() -> TestResult {
        let mut binding = MockBinding::new()
            .fail_discover("no bus")
            .fail_format("busy")
            .fail_update("bad image");
        let mut session = EnvSession::start(&mut binding, &EnvOptions::default())?;

        assert!(matches!(session.discover(), Err(BindingError::Discover(m)) if m == "no bus"));
        assert!(matches!(session.format(), Err(BindingError::Format(m)) if m == "busy"));
        assert!(matches!(
            session.update("0000:81:00.0", Path::new("/fw.bin"), 0),
            Err(BindingError::Update { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_init_failure_reports_rc() {
        let mut binding = MockBinding::new().fail_init(-12);
        let handle = binding.clone();
        let result = EnvSession::start(&mut binding, &EnvOptions::default());
        assert!(matches!(result, Err(BindingError::EnvInit { rc: -12 })));
        assert!(!handle.is_env_active());
    }

    #[test]
    fn test_clean_lock_files_allowed_outside_env() -> TestResult {
        let mut binding = MockBinding::new();
        binding.clean_lock_files(&["0000:81:00.0".to_string()])?;
        assert_eq!(
            binding.calls(),
            vec![BindingCall::CleanLockFiles(vec!["0000:81:00.0".to_string()])]
        );
        Ok(())
    }
}
