//! Volume Management Device (VMD) bridge detection.
//!
//! Detection runs `lspci | grep -i -E "201d|Volume Management Device"` and
//! parses whatever lines survive the filter. `lspci` output differs between
//! hosts (with or without the PCI domain, with numeric or named device
//! ids), so the parser counts matches with a fixed order of markers.

use std::io;
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::{debug, warn};

use storctl_binding::with_domain;

/// Pattern handed to `grep -i -E`.
pub const VMD_PATTERN: &str = "201d|Volume Management Device";

const DOMAIN_MARKER: &str = "0000:";
const NAME_MARKER: &str = "Volume";
const DEVICE_ID_MARKER: &str = "201d";

/// Errors raised during VMD detection
#[derive(Error, Debug)]
pub enum VmdError {
    /// A pipeline stage could not be started or awaited
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Program name
        program: &'static str,
        /// Underlying failure
        #[source]
        source: io::Error,
    },

    /// The filter stage failed (not merely "no match")
    #[error("{program} exited with {status}")]
    Filter {
        /// Program name
        program: &'static str,
        /// Exit status description
        status: String,
    },

    /// Matches were reported but no address could be extracted
    #[error("error parsing cmd output: {output:?}")]
    Parse {
        /// Filtered listing text
        output: String,
    },
}

/// Parse filtered `lspci` text into VMD PCI addresses.
///
/// Empty or whitespace-only input means no VMD devices. Otherwise the number
/// of devices is the count of `0000:` markers; when the listing omits the
/// domain, the count of `Volume` markers, then of `201d` markers. The first
/// token of that many non-blank lines is taken as the address, gaining the
/// default domain when the listing had none.
///
/// # Errors
///
/// Returns [`VmdError::Parse`] when the input is non-empty but yields no
/// address.
///
/// # Examples
///
/// ```
/// use storctl_bdev::vmd::parse_vmd_listing;
///
/// let listing = "5d:05.5 RAID bus controller: Intel Corporation Volume Management Device NVMe RAID Controller (rev 04)\n";
/// assert_eq!(parse_vmd_listing(listing)?, vec!["0000:5d:05.5".to_string()]);
/// assert!(parse_vmd_listing("")?.is_empty());
/// # Ok::<(), storctl_bdev::vmd::VmdError>(())
/// ```
pub fn parse_vmd_listing(text: &str) -> Result<Vec<String>, VmdError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let (count, has_domain) = match text.matches(DOMAIN_MARKER).count() {
        0 => {
            let named = text.matches(NAME_MARKER).count();
            let count = if named == 0 {
                text.matches(DEVICE_ID_MARKER).count()
            } else {
                named
            };
            (count, false)
        }
        n => (n, true),
    };

    let addrs: Vec<String> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(count)
        .filter_map(|line| line.split_whitespace().next())
        .map(|addr| {
            if has_domain {
                addr.to_string()
            } else {
                with_domain(addr)
            }
        })
        .collect();

    if addrs.is_empty() {
        return Err(VmdError::Parse {
            output: text.trim().to_string(),
        });
    }
    Ok(addrs)
}

/// Source of filtered PCI listing text
pub trait VmdLister: Send {
    /// Return the listing lines that mention a VMD bridge.
    fn list(&mut self) -> Result<String, VmdError>;
}

/// Two-stage `lspci | grep` pipeline
#[derive(Debug, Clone)]
pub struct LspciPipeline {
    lspci: String,
    grep: String,
}

impl Default for LspciPipeline {
    fn default() -> Self {
        Self {
            lspci: "lspci".to_string(),
            grep: "grep".to_string(),
        }
    }
}

impl LspciPipeline {
    /// Pipeline with explicit program paths.
    pub fn with_programs(lspci: impl Into<String>, grep: impl Into<String>) -> Self {
        Self {
            lspci: lspci.into(),
            grep: grep.into(),
        }
    }
}

impl VmdLister for LspciPipeline {
    fn list(&mut self) -> Result<String, VmdError> {
        let mut lspci = Command::new(&self.lspci)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| VmdError::Spawn {
                program: "lspci",
                source,
            })?;

        let Some(listing) = lspci.stdout.take() else {
            return Err(VmdError::Spawn {
                program: "lspci",
                source: io::Error::other("stdout not captured"),
            });
        };

        let filtered = Command::new(&self.grep)
            .args(["-i", "-E", VMD_PATTERN])
            .stdin(Stdio::from(listing))
            .stderr(Stdio::null())
            .output()
            .map_err(|source| VmdError::Spawn {
                program: "grep",
                source,
            });

        let lspci_status = lspci.wait().map_err(|source| VmdError::Spawn {
            program: "lspci",
            source,
        })?;
        if !lspci_status.success() {
            warn!(status = %lspci_status, "lspci exited unsuccessfully");
        }

        let filtered = filtered?;
        // grep exits 1 when nothing matched.
        match filtered.status.code() {
            Some(0 | 1) => {}
            _ => {
                return Err(VmdError::Filter {
                    program: "grep",
                    status: filtered.status.to_string(),
                });
            }
        }

        let text = String::from_utf8_lossy(&filtered.stdout).into_owned();
        debug!(lines = text.lines().count(), "VMD listing captured");
        Ok(text)
    }
}

pub mod mock {
    //! Fixed listing text for tests.

    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    #[derive(Debug, Default)]
    struct ListingState {
        text: String,
        fail: bool,
        calls: usize,
    }

    /// [`VmdLister`] returning canned text; clones share state
    #[derive(Debug, Clone, Default)]
    pub struct StaticListing {
        state: Arc<Mutex<ListingState>>,
    }

    impl StaticListing {
        /// Lister returning `text` on every call.
        pub fn new(text: impl Into<String>) -> Self {
            let listing = Self::default();
            listing.state.lock().text = text.into();
            listing
        }

        /// Make `list` fail as if `lspci` were missing.
        pub fn failing() -> Self {
            let listing = Self::default();
            listing.state.lock().fail = true;
            listing
        }

        /// Number of `list` calls so far.
        pub fn calls(&self) -> usize {
            self.state.lock().calls
        }
    }

    impl VmdLister for StaticListing {
        fn list(&mut self) -> Result<String, VmdError> {
            let mut state = self.state.lock();
            state.calls = state.calls.saturating_add(1);
            if state.fail {
                return Err(VmdError::Spawn {
                    program: "lspci",
                    source: io::Error::from(io::ErrorKind::NotFound),
                });
            }
            Ok(state.text.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WITH_DOMAIN: &str = "\
0000:5d:05.5 RAID bus controller: Intel Corporation Volume Management Device NVMe RAID Controller (rev 04)
0000:d7:05.5 RAID bus controller: Intel Corporation Volume Management Device NVMe RAID Controller (rev 04)
";

    const NUMERIC_IDS: &str = "\
5d:05.5 0104: 8086:201d (rev 04)
d7:05.5 0104: 8086:201d (rev 04)
";

    #[test]
    fn test_domain_present() -> Result<(), VmdError> {
        assert_eq!(
            parse_vmd_listing(WITH_DOMAIN)?,
            vec!["0000:5d:05.5".to_string(), "0000:d7:05.5".to_string()]
        );
        Ok(())
    }

    #[test]
    fn test_numeric_ids_without_domain() -> Result<(), VmdError> {
        assert_eq!(
            parse_vmd_listing(NUMERIC_IDS)?,
            vec!["0000:5d:05.5".to_string(), "0000:d7:05.5".to_string()]
        );
        Ok(())
    }

    #[test]
    fn test_wide_domain_not_reprefixed() -> Result<(), VmdError> {
        let text = "5d0505:01:00.0 0104: 8086:201d (rev 04)\n";
        assert_eq!(parse_vmd_listing(text)?, vec!["5d0505:01:00.0".to_string()]);
        Ok(())
    }

    #[test]
    fn test_blank_output() -> Result<(), VmdError> {
        assert!(parse_vmd_listing("")?.is_empty());
        assert!(parse_vmd_listing("\n  \n")?.is_empty());
        Ok(())
    }

    #[test]
    fn test_unmarked_output_is_parse_error() {
        assert!(matches!(
            parse_vmd_listing("garbage line\n"),
            Err(VmdError::Parse { .. })
        ));
    }

    #[test]
    fn test_count_limits_lines() -> Result<(), VmdError> {
        // One domain marker, so only the first line is taken.
        let text = "0000:5d:05.5 Volume Management Device\nstray line\n";
        assert_eq!(parse_vmd_listing(text)?, vec!["0000:5d:05.5".to_string()]);
        Ok(())
    }

    #[test]
    fn test_blank_lines_skipped() -> Result<(), VmdError> {
        let text = "\n5d:05.5 RAID bus controller: Intel Corporation Volume Management Device\n";
        assert_eq!(parse_vmd_listing(text)?, vec!["0000:5d:05.5".to_string()]);
        Ok(())
    }

    #[test]
    fn test_missing_lspci_is_spawn_error() {
        let mut pipeline = LspciPipeline::with_programs("/nonexistent/lspci", "grep");
        assert!(matches!(
            pipeline.list(),
            Err(VmdError::Spawn { program: "lspci", .. })
        ));
    }
}
