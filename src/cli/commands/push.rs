use crate::cli::output::Output;
use crate::errors::{Result, StacksmithError};
use crate::git::{self, GitRepository};
use crate::utils::spinner::Spinner;

/// Smart push: force push when an upstream exists, set one otherwise.
pub fn run() -> Result<()> {
    let repo = git::get_current_repository()?;

    let branch = repo
        .current_branch()?
        .ok_or_else(|| StacksmithError::branch("Not on a branch (detached HEAD?)"))?;

    smart_push(&repo, &branch)
}

pub(crate) fn smart_push(repo: &GitRepository, branch: &str) -> Result<()> {
    let spinner = Spinner::new(format!("Pushing {branch}..."));

    let result = if repo.upstream_of(branch)?.is_some() {
        repo.push_branch(branch).map(|()| false)
    } else {
        repo.push_set_upstream(branch).map(|()| true)
    };
    spinner.stop();

    match result {
        Ok(true) => Output::new_upstream_success(branch),
        Ok(false) => Output::push_success(branch),
        Err(e) => return Err(e),
    }
    Ok(())
}
