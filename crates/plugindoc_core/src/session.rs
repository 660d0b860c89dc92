use std::fmt;
use std::ops::{Deref, DerefMut};

use tracing::{debug, info, warn};

use crate::directory::PageDirectory;
use crate::error::{DirectoryError, SyncError};

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A logged-in directory. Logs out on [`Session::close`] or, failing that,
/// when dropped.
pub struct Session<'a, D: PageDirectory> {
    directory: &'a mut D,
    open: bool,
}

impl<'a, D: PageDirectory> Session<'a, D> {
    pub fn open(directory: &'a mut D, credentials: &Credentials) -> Result<Self, SyncError> {
        info!(user = %credentials.username, "logging in");
        directory
            .login(&credentials.username, &credentials.password)
            .map_err(SyncError::Auth)?;
        Ok(Self {
            directory,
            open: true,
        })
    }

    pub fn close(mut self) -> Result<(), DirectoryError> {
        self.open = false;
        debug!("logging out");
        self.directory.logout()
    }
}

impl<D: PageDirectory> Deref for Session<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        self.directory
    }
}

impl<D: PageDirectory> DerefMut for Session<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        self.directory
    }
}

impl<D: PageDirectory> Drop for Session<'_, D> {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        if let Err(error) = self.directory.logout() {
            warn!(%error, "logout after aborted run failed");
        }
    }
}

/// Run `work` inside a session. Logout is attempted whatever `work` returns;
/// a logout failure is logged and never masks the work's own result.
pub fn with_session<D, T, F>(
    directory: &mut D,
    credentials: &Credentials,
    work: F,
) -> Result<T, SyncError>
where
    D: PageDirectory,
    F: FnOnce(&mut D) -> Result<T, SyncError>,
{
    let mut session = Session::open(directory, credentials)?;
    let result = work(&mut *session);
    if let Err(error) = session.close() {
        warn!(%error, "logout failed");
    }
    result
}
