//! Filesystem-backed tests for huge-page reclaim and configuration loading.

use std::fs;
use std::os::unix::fs::MetadataExt;

use storctl_bdev::config::ConfigError;
use storctl_bdev::hugepages::{HugePageCleaner, HugePageDir, HugePageError};
use storctl_bdev::BackendConfig;
use storctl_bdev::script::SetupScript;
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

mod hugepage_tests {
    use super::*;

    fn populated() -> Result<(TempDir, u32), std::io::Error> {
        let dir = TempDir::new()?;
        fs::write(dir.path().join("spdk_a"), b"")?;
        fs::write(dir.path().join("other_c"), b"")?;
        fs::create_dir(dir.path().join("spdk_subdir"))?;
        fs::write(dir.path().join("spdk_subdir").join("spdk_nested"), b"")?;
        let uid = fs::metadata(dir.path().join("spdk_a"))?.uid();
        Ok((dir, uid))
    }

    #[test]
    fn test_removes_only_prefixed_files_of_owner() -> TestResult {
        let (dir, uid) = populated()?;
        let mut cleaner = HugePageDir::new(dir.path(), "spdk");

        assert_eq!(cleaner.clean(uid)?, 1);

        assert!(!dir.path().join("spdk_a").exists());
        assert!(dir.path().join("other_c").exists());
        assert!(dir.path().join("spdk_subdir").join("spdk_nested").exists());
        Ok(())
    }

    #[test]
    fn test_unprefixed_files_of_owner_survive() -> TestResult {
        let (dir, uid) = populated()?;
        fs::write(dir.path().join("spdk_b"), b"")?;
        fs::write(dir.path().join("other_d"), b"")?;
        let mut cleaner = HugePageDir::new(dir.path(), "spdk");

        assert_eq!(cleaner.clean(uid)?, 2);

        assert!(!dir.path().join("spdk_b").exists());
        assert!(dir.path().join("other_c").exists());
        assert!(dir.path().join("other_d").exists());
        Ok(())
    }

    #[test]
    fn test_other_owner_untouched() -> TestResult {
        let (dir, uid) = populated()?;
        let mut cleaner = HugePageDir::new(dir.path(), "spdk");

        assert_eq!(cleaner.clean(uid.wrapping_add(1))?, 0);

        assert!(dir.path().join("spdk_a").exists());
        Ok(())
    }

    #[test]
    fn test_empty_dir() -> TestResult {
        let dir = TempDir::new()?;
        assert_eq!(HugePageDir::new(dir.path(), "spdk").clean(0)?, 0);
        Ok(())
    }

    #[test]
    fn test_missing_root_fails_walk() {
        let mut cleaner = HugePageDir::new("/nonexistent/storctl/hugepages", "spdk");
        assert!(matches!(cleaner.clean(0), Err(HugePageError::Walk(_))));
    }
}

mod config_tests {
    use super::*;

    #[test]
    fn test_load_from_file() -> TestResult {
        let dir = TempDir::new()?;
        let path = dir.path().join("bdev.yaml");
        fs::write(
            &path,
            "hugepage_dir: /mnt/huge\nnr_hugepages: 8192\nnative_library: /usr/lib64/libstorctl_spdk.so\n",
        )?;

        let config = BackendConfig::load(&path)?;
        assert_eq!(config.hugepage_dir, std::path::PathBuf::from("/mnt/huge"));
        assert_eq!(config.nr_hugepages, 8192);
        assert_eq!(config.hugepage_prefix, "spdk");
        assert_eq!(
            config.native_library.as_deref(),
            Some(std::path::Path::new("/usr/lib64/libstorctl_spdk.so"))
        );
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let result = BackendConfig::load(std::path::Path::new("/nonexistent/bdev.yaml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_yaml_round_trip() -> TestResult {
        let config = BackendConfig {
            disable_vmd: true,
            nr_hugepages: 512,
            ..BackendConfig::default()
        };
        let yaml = config.to_yaml_string()?;
        assert_eq!(BackendConfig::from_yaml_str(&yaml)?, config);
        Ok(())
    }

    #[test]
    fn test_zero_hugepages_rejected() {
        assert!(matches!(
            BackendConfig::from_yaml_str("nr_hugepages: 0\n"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_components_follow_config() -> TestResult {
        let config = BackendConfig::from_yaml_str(
            "hugepage_dir: /mnt/huge\nhugepage_prefix: storctl\nsetup_script: /opt/setup.sh\n",
        )?;
        assert_eq!(config.hugepage_dir(), HugePageDir::new("/mnt/huge", "storctl"));
        assert_eq!(
            config.setup_script(),
            SetupScript::new("/opt/setup.sh").with_nr_hugepages(config.nr_hugepages)
        );
        Ok(())
    }
}
