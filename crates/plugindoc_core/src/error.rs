use thiserror::Error;

/// Problems with the descriptor or the run configuration. Always raised
/// before the first remote call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("plugin artifact id cannot be empty")]
    EmptyArtifactId,
    #[error("goal #{index} has an empty name")]
    EmptyGoalName { index: usize },
    #[error("duplicate full goal name: {0}")]
    DuplicateGoal(String),
    #[error("duplicate page title `{title}` (goals `{first}` and `{second}`)")]
    DuplicateTitle {
        title: String,
        first: String,
        second: String,
    },
    #[error("goal `{goal}` would reuse the plugin page title `{title}`")]
    TitleClashesWithRoot { goal: String, title: String },
    #[error("{0} is required")]
    MissingSetting(&'static str),
}

/// Failures reported by a [`crate::directory::PageDirectory`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("page `{title}` already exists in space {space}")]
    Conflict { space: String, title: String },
    #[error("remote write failed: {0}")]
    RemoteWrite(String),
    #[error("remote request failed: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Errors that abort a whole run. Per-page failures are recorded in the
/// report instead.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("login failed: {0}")]
    Auth(DirectoryError),
    #[error("parent page `{title}` not found in space {space}")]
    ParentPageMissing { space: String, title: String },
    #[error("failed to resolve parent page: {0}")]
    Directory(DirectoryError),
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
