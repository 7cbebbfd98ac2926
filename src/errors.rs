/// Stacksmith error types
#[derive(Debug, thiserror::Error)]
pub enum StacksmithError {
    /// Git-level errors surfaced by libgit2
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// The repository itself cannot be queried (not a repo, bare repo, ...)
    #[error("Repository unavailable: {0}")]
    Repository(String),

    /// The persisted stack file exists but cannot be parsed
    #[error("Stack store corrupt: {0}")]
    StoreCorrupt(String),

    /// Branch lookup / manipulation errors
    #[error("Branch error: {0}")]
    Branch(String),

    /// Rebase errors, including conflicts that need manual resolution
    #[error("Rebase error: {0}")]
    Rebase(String),

    /// Remote / push errors
    #[error("Remote error: {0}")]
    Remote(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StacksmithError {
    pub fn repository<S: Into<String>>(msg: S) -> Self {
        StacksmithError::Repository(msg.into())
    }

    pub fn store_corrupt<S: Into<String>>(msg: S) -> Self {
        StacksmithError::StoreCorrupt(msg.into())
    }

    pub fn branch<S: Into<String>>(msg: S) -> Self {
        StacksmithError::Branch(msg.into())
    }

    pub fn rebase<S: Into<String>>(msg: S) -> Self {
        StacksmithError::Rebase(msg.into())
    }

    pub fn remote<S: Into<String>>(msg: S) -> Self {
        StacksmithError::Remote(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, StacksmithError>;
