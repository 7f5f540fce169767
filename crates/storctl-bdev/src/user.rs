//! Resolve OS user names to numeric uids.

#![expect(unsafe_code, reason = "getpwnam_r from libc")]

use std::ffi::{CString, NulError};
use std::io;

use thiserror::Error;

const INITIAL_BUF_LEN: usize = 1024;
const MAX_BUF_LEN: usize = 1 << 20;

/// Errors raised while resolving a user
#[derive(Error, Debug)]
pub enum UserError {
    /// No such user
    #[error("unknown user {0:?}")]
    NotFound(String),

    /// User name contains a nul byte
    #[error("invalid user name: {0}")]
    InvalidName(#[from] NulError),

    /// Password database lookup failed
    #[error("user database lookup failed: {0}")]
    Lookup(#[source] io::Error),
}

/// Maps user names to uids
pub trait UserResolver: Send {
    /// Look up the uid of `name`.
    fn lookup_uid(&self, name: &str) -> Result<u32, UserError>;
}

/// Resolver backed by the system password database
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemUsers;

impl UserResolver for SystemUsers {
    fn lookup_uid(&self, name: &str) -> Result<u32, UserError> {
        let cname = CString::new(name)?;
        let mut buf: Vec<libc::c_char> = vec![0; INITIAL_BUF_LEN];

        loop {
            // SAFETY: passwd is plain old data; an all-zero value is valid.
            let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
            let mut result: *mut libc::passwd = std::ptr::null_mut();

            // SAFETY: every pointer refers to live storage owned by this
            // frame and `buf.len()` is the true length of `buf`.
            let rc = unsafe {
                libc::getpwnam_r(
                    cname.as_ptr(),
                    &mut pwd,
                    buf.as_mut_ptr(),
                    buf.len(),
                    &mut result,
                )
            };

            match rc {
                0 if result.is_null() => return Err(UserError::NotFound(name.to_string())),
                libc::ENOENT | libc::ESRCH => return Err(UserError::NotFound(name.to_string())),
                0 => return Ok(pwd.pw_uid),
                libc::ERANGE if buf.len() < MAX_BUF_LEN => {
                    let len = buf.len().saturating_mul(2);
                    buf.resize(len, 0);
                }
                err => return Err(UserError::Lookup(io::Error::from_raw_os_error(err))),
            }
        }
    }
}

pub mod mock {
    //! Fixed user table for tests.

    use std::collections::HashMap;

    use super::*;

    /// [`UserResolver`] over an in-memory table
    #[derive(Debug, Clone, Default)]
    pub struct StaticUsers {
        users: HashMap<String, u32>,
    }

    impl StaticUsers {
        /// Empty table.
        pub fn new() -> Self {
            Self::default()
        }

        /// Add a user.
        pub fn with_user(mut self, name: impl Into<String>, uid: u32) -> Self {
            self.users.insert(name.into(), uid);
            self
        }
    }

    impl UserResolver for StaticUsers {
        fn lookup_uid(&self, name: &str) -> Result<u32, UserError> {
            self.users
                .get(name)
                .copied()
                .ok_or_else(|| UserError::NotFound(name.to_string()))
        }
    }
}
