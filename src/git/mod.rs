pub mod repository;

pub use repository::GitRepository;

use crate::errors::{Result, StacksmithError};
use std::path::Path;

/// Find the root of the Git repository containing `start_path`.
pub fn find_repository_root(start_path: &Path) -> Result<std::path::PathBuf> {
    let repo = git2::Repository::discover(start_path)
        .map_err(|e| StacksmithError::repository(format!("Not a git repository: {e}")))?;

    let workdir = repo
        .workdir()
        .ok_or_else(|| StacksmithError::repository("Repository has no working directory (bare repo?)"))?;

    Ok(workdir.to_path_buf())
}

/// Open the repository containing the current working directory.
pub fn get_current_repository() -> Result<GitRepository> {
    let current_dir = std::env::current_dir()
        .map_err(|e| StacksmithError::repository(format!("Could not get current directory: {e}")))?;

    let repo_root = find_repository_root(&current_dir)?;
    GitRepository::open(&repo_root)
}
