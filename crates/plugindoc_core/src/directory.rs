use serde::Serialize;

use crate::error::DirectoryError;

/// A page as the wiki service reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemotePage {
    pub id: String,
    pub title: String,
    pub space_key: String,
    /// `None` only for a space's top-level pages.
    pub parent_id: Option<String>,
    #[serde(skip)]
    pub body: String,
    pub version: u64,
}

/// The page operations the synchronizer needs from a wiki service.
///
/// Lookups are keyed by `(space, title)`; a missing page is `Ok(None)`.
/// Mutating calls require a prior successful [`PageDirectory::login`].
pub trait PageDirectory {
    fn login(&mut self, username: &str, password: &str) -> Result<(), DirectoryError>;
    fn logout(&mut self) -> Result<(), DirectoryError>;
    fn find_page(&mut self, space: &str, title: &str)
    -> Result<Option<RemotePage>, DirectoryError>;
    /// Fails with [`DirectoryError::Conflict`] if the title was taken
    /// between lookup and creation.
    fn create_page(
        &mut self,
        space: &str,
        title: &str,
        parent_id: &str,
        body: &str,
    ) -> Result<RemotePage, DirectoryError>;
    /// Replaces the body in place. The parent link is left untouched.
    fn update_page(&mut self, page: &RemotePage, body: &str) -> Result<RemotePage, DirectoryError>;
    fn request_count(&self) -> usize;
}

/// Body equality as far as convergence is concerned.
pub fn same_body(remote: &str, rendered: &str) -> bool {
    remote.trim() == rendered.trim()
}
