//! Standard output suppression around native calls.
//!
//! The native framework prints diagnostics straight to file descriptor 1.
//! The privileged helper shares that descriptor with its parent as a
//! message channel, so every native call runs with stdout pointed at
//! `/dev/null`.

#![expect(unsafe_code, reason = "dup2 on the process stdout descriptor")]

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::os::fd::{AsFd, AsRawFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::error;

/// Process stdout redirection
///
/// `suppress` and `restore` must alternate. Implementations that touch the
/// real descriptor are process-wide and refuse nested suppression.
pub trait StdoutRedirect: Send {
    /// Point stdout at the null device, saving the current target.
    fn suppress(&mut self) -> io::Result<()>;

    /// Point stdout back at the saved target.
    fn restore(&mut self) -> io::Result<()>;
}

/// Set while any [`DevNullRedirect`] holds stdout.
static SUPPRESSED: AtomicBool = AtomicBool::new(false);

/// Redirects the real stdout descriptor to `/dev/null`
#[derive(Debug, Default)]
pub struct DevNullRedirect {
    saved: Option<OwnedFd>,
}

impl DevNullRedirect {
    /// Create an idle redirect.
    pub fn new() -> Self {
        Self::default()
    }

    fn redirect_to(fd: RawFd) -> io::Result<()> {
        // SAFETY: `fd` is an open descriptor owned by the caller for the
        // duration of the call; dup2 does not take ownership of it.
        let rc = unsafe { libc::dup2(fd, libc::STDOUT_FILENO) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn try_suppress(&mut self) -> io::Result<()> {
        io::stdout().flush()?;
        let saved = io::stdout().as_fd().try_clone_to_owned()?;
        let dev_null = OpenOptions::new().write(true).open("/dev/null")?;
        Self::redirect_to(dev_null.as_raw_fd())?;
        self.saved = Some(saved);
        Ok(())
    }
}

impl StdoutRedirect for DevNullRedirect {
    fn suppress(&mut self) -> io::Result<()> {
        if SUPPRESSED.swap(true, Ordering::AcqRel) {
            return Err(io::Error::other("stdout is already suppressed"));
        }
        self.try_suppress().inspect_err(|_| {
            SUPPRESSED.store(false, Ordering::Release);
        })
    }

    fn restore(&mut self) -> io::Result<()> {
        let saved = self
            .saved
            .take()
            .ok_or_else(|| io::Error::other("stdout is not suppressed"))?;
        // Anything still buffered belongs to the native call.
        io::stdout().flush()?;
        Self::redirect_to(saved.as_raw_fd())?;
        SUPPRESSED.store(false, Ordering::Release);
        Ok(())
    }
}

/// Scoped stdout suppression; restores on drop
///
/// A failed restore leaves the descriptor table in an unknown state, so the
/// process is aborted rather than continuing with a possibly corrupted
/// channel.
pub struct OutputGuard<'a, R: StdoutRedirect + ?Sized> {
    redirect: &'a mut R,
}

impl<'a, R: StdoutRedirect + ?Sized> OutputGuard<'a, R> {
    /// Suppress stdout until the guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns the redirect's error; stdout is untouched in that case.
    pub fn acquire(redirect: &'a mut R) -> io::Result<Self> {
        redirect.suppress()?;
        Ok(Self { redirect })
    }
}

impl<R: StdoutRedirect + ?Sized> Drop for OutputGuard<'_, R> {
    fn drop(&mut self) {
        if let Err(e) = self.redirect.restore() {
            error!(error = %e, "failed to restore stdout after native call");
            std::process::abort();
        }
    }
}

pub mod mock {
    //! Redirect that records suppress/restore pairs without touching stdout.

    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    /// Event observed by [`RecordingRedirect`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum RedirectEvent {
        /// `suppress` succeeded
        Suppress,
        /// `restore` succeeded
        Restore,
    }

    #[derive(Debug, Default)]
    struct RecordingState {
        events: Vec<RedirectEvent>,
        suppressed: bool,
        fail_suppress: bool,
    }

    /// In-memory [`StdoutRedirect`]; clones share state
    #[derive(Debug, Clone, Default)]
    pub struct RecordingRedirect {
        state: Arc<Mutex<RecordingState>>,
    }

    impl RecordingRedirect {
        /// Create a recorder.
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every `suppress` fail.
        pub fn fail_suppress(self) -> Self {
            self.state.lock().fail_suppress = true;
            self
        }

        /// Events observed so far.
        pub fn events(&self) -> Vec<RedirectEvent> {
            self.state.lock().events.clone()
        }

        /// Whether stdout is currently considered suppressed.
        pub fn is_suppressed(&self) -> bool {
            self.state.lock().suppressed
        }

        /// Whether every suppress has a matching restore.
        pub fn is_balanced(&self) -> bool {
            let state = self.state.lock();
            let suppress = state
                .events
                .iter()
                .filter(|e| **e == RedirectEvent::Suppress)
                .count();
            !state.suppressed && suppress == state.events.len() - suppress
        }
    }

    impl StdoutRedirect for RecordingRedirect {
        fn suppress(&mut self) -> io::Result<()> {
            let mut state = self.state.lock();
            if state.fail_suppress {
                return Err(io::Error::other("suppress refused"));
            }
            if state.suppressed {
                return Err(io::Error::other("stdout is already suppressed"));
            }
            state.suppressed = true;
            state.events.push(RedirectEvent::Suppress);
            Ok(())
        }

        fn restore(&mut self) -> io::Result<()> {
            let mut state = self.state.lock();
            state.suppressed = false;
            state.events.push(RedirectEvent::Restore);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{RecordingRedirect, RedirectEvent};
    use super::*;

    #[test]
    fn test_guard_pairs_suppress_and_restore() -> io::Result<()> {
        let mut redirect = RecordingRedirect::new();
        let handle = redirect.clone();
        {
            let _guard = OutputGuard::acquire(&mut redirect)?;
            assert!(handle.is_suppressed());
        }
        assert_eq!(
            handle.events(),
            vec![RedirectEvent::Suppress, RedirectEvent::Restore]
        );
        assert!(handle.is_balanced());
        Ok(())
    }

    #[test]
    fn test_failed_acquire_does_not_restore() {
        let mut redirect = RecordingRedirect::new().fail_suppress();
        let handle = redirect.clone();
        assert!(OutputGuard::acquire(&mut redirect).is_err());
        assert!(handle.events().is_empty());
    }

    #[test]
    fn test_guard_restores_on_unwind() {
        let redirect = RecordingRedirect::new();
        let handle = redirect.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let mut redirect = redirect;
            let _guard = OutputGuard::acquire(&mut redirect);
            std::panic::resume_unwind(Box::new("native call failed"));
        }));
        assert!(result.is_err());
        assert!(handle.is_balanced());
    }

    #[test]
    fn test_dev_null_redirect_round_trip() -> io::Result<()> {
        let mut redirect = DevNullRedirect::new();
        {
            let _guard = OutputGuard::acquire(&mut redirect)?;
            let mut second = DevNullRedirect::new();
            assert!(second.suppress().is_err());
        }
        assert!(redirect.restore().is_err());
        Ok(())
    }
}
