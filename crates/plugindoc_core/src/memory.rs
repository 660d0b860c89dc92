//! In-memory [`PageDirectory`] used by the tests.

use std::collections::{BTreeMap, BTreeSet};

use crate::directory::{PageDirectory, RemotePage};
use crate::error::DirectoryError;

#[derive(Debug, Default)]
pub(crate) struct MemoryDirectory {
    pub pages: BTreeMap<(String, String), RemotePage>,
    pub calls: Vec<String>,
    pub reject_login: bool,
    pub logged_in: bool,
    pub logouts: usize,
    pub fail_lookups: BTreeSet<String>,
    pub fail_creates: BTreeSet<String>,
    pub fail_updates: BTreeSet<String>,
    /// Titles that another writer creates right before our create call.
    pub racing_creates: BTreeSet<String>,
    /// Titles whose racing page vanishes again before the re-lookup.
    pub vanishing_races: BTreeSet<String>,
    /// Titles whose lookups start failing once a racing create was seen.
    pub failing_relookups: BTreeSet<String>,
    next_id: u64,
    request_count: usize,
}

impl MemoryDirectory {
    pub fn with_home(space: &str) -> Self {
        let mut directory = Self::default();
        directory.seed(space, "Home", None, "");
        directory
    }

    pub fn seed(
        &mut self,
        space: &str,
        title: &str,
        parent_id: Option<&str>,
        body: &str,
    ) -> RemotePage {
        self.next_id += 1;
        let page = RemotePage {
            id: self.next_id.to_string(),
            title: title.to_string(),
            space_key: space.to_string(),
            parent_id: parent_id.map(ToString::to_string),
            body: body.to_string(),
            version: 1,
        };
        self.pages
            .insert((space.to_string(), title.to_string()), page.clone());
        page
    }

    pub fn page(&self, space: &str, title: &str) -> Option<&RemotePage> {
        self.pages.get(&(space.to_string(), title.to_string()))
    }

    pub fn mutations(&self) -> Vec<&str> {
        self.calls
            .iter()
            .map(String::as_str)
            .filter(|call| call.starts_with("create:") || call.starts_with("update:"))
            .collect()
    }

    fn require_session(&self) -> Result<(), DirectoryError> {
        if self.logged_in {
            Ok(())
        } else {
            Err(DirectoryError::Auth("not logged in".to_string()))
        }
    }
}

impl PageDirectory for MemoryDirectory {
    fn login(&mut self, username: &str, _password: &str) -> Result<(), DirectoryError> {
        self.request_count += 1;
        self.calls.push(format!("login:{username}"));
        if self.reject_login {
            return Err(DirectoryError::Auth("invalid credentials".to_string()));
        }
        self.logged_in = true;
        Ok(())
    }

    fn logout(&mut self) -> Result<(), DirectoryError> {
        self.request_count += 1;
        self.calls.push("logout".to_string());
        self.logged_in = false;
        self.logouts += 1;
        Ok(())
    }

    fn find_page(
        &mut self,
        space: &str,
        title: &str,
    ) -> Result<Option<RemotePage>, DirectoryError> {
        self.request_count += 1;
        self.calls.push(format!("find:{title}"));
        self.require_session()?;
        if self.fail_lookups.contains(title) {
            return Err(DirectoryError::Transport("connection reset".to_string()));
        }
        if self.page(space, title).is_some() && self.vanishing_races.remove(title) {
            self.pages.remove(&(space.to_string(), title.to_string()));
        }
        Ok(self.page(space, title).cloned())
    }

    fn create_page(
        &mut self,
        space: &str,
        title: &str,
        parent_id: &str,
        body: &str,
    ) -> Result<RemotePage, DirectoryError> {
        self.request_count += 1;
        self.calls.push(format!("create:{title}"));
        self.require_session()?;
        if self.fail_creates.contains(title) {
            return Err(DirectoryError::RemoteWrite("HTTP 500".to_string()));
        }
        if self.racing_creates.remove(title) {
            self.seed(space, title, Some(parent_id), "<p>written elsewhere</p>");
            if self.failing_relookups.remove(title) {
                self.fail_lookups.insert(title.to_string());
            }
        }
        if self.page(space, title).is_some() {
            return Err(DirectoryError::Conflict {
                space: space.to_string(),
                title: title.to_string(),
            });
        }
        Ok(self.seed(space, title, Some(parent_id), body))
    }

    fn update_page(&mut self, page: &RemotePage, body: &str) -> Result<RemotePage, DirectoryError> {
        self.request_count += 1;
        self.calls.push(format!("update:{}", page.title));
        self.require_session()?;
        if self.fail_updates.contains(&page.title) {
            return Err(DirectoryError::RemoteWrite("HTTP 500".to_string()));
        }
        let key = (page.space_key.clone(), page.title.clone());
        let stored = self.pages.get_mut(&key).ok_or_else(|| {
            DirectoryError::RemoteWrite(format!("page {} no longer exists", page.title))
        })?;
        stored.body = body.to_string();
        stored.version += 1;
        Ok(stored.clone())
    }

    fn request_count(&self) -> usize {
        self.request_count
    }
}
