use crate::cli::output::Output;
use crate::errors::{Result, StacksmithError};
use crate::git;
use std::process::Command;

/// Show the commit graph. libgit2 has no graph renderer, so this defers
/// to the git binary the way it was always rendered.
pub fn run() -> Result<()> {
    let repo = git::get_current_repository()?;

    let output = Command::new("git")
        .args(["log", "--graph", "--oneline", "--decorate", "--all"])
        .current_dir(repo.path())
        .output()
        .map_err(|e| StacksmithError::repository(format!("Could not run git: {e}")))?;

    if !output.status.success() {
        return Err(StacksmithError::repository(format!(
            "git log failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Output::divider();
    print!("{}", String::from_utf8_lossy(&output.stdout));
    Output::divider();
    Output::tip("Try 'stacksmith tree' for the stacked-branch view");
    Ok(())
}
