use crate::cli::output::Output;
use crate::errors::{Result, StacksmithError};
use crate::git::{self, GitRepository};
use crate::utils::spinner::Spinner;
use dialoguer::{theme::ColorfulTheme, Select};

/// Rebase one branch onto a new base (typically after its PR target
/// changed) and push it.
pub fn run(branch: Option<String>, target: Option<String>) -> Result<()> {
    let repo = git::get_current_repository()?;

    let (branch, target) = match (branch, target) {
        (Some(branch), Some(target)) => (branch, target),
        (branch, _) => prompt_for_branches(&repo, branch)?,
    };

    let spinner = Spinner::new(format!("Reworking {branch} onto {target}..."));

    repo.checkout_branch(&branch)?;
    repo.fetch()?;

    // The PR base moved on the remote, so rebase onto its remote ref.
    let rebase_target = if target.starts_with("origin/") {
        target.clone()
    } else {
        format!("origin/{target}")
    };
    repo.rebase_branch(&branch, &rebase_target)?;

    spinner.update_message(format!("Pushing {branch}..."));
    repo.push_branch(&branch)?;
    spinner.stop();

    Output::success(format!("Rebased {branch} onto {target}"));
    Output::retarget_reminder(&branch, &target);
    Ok(())
}

fn prompt_for_branches(
    repo: &GitRepository,
    branch: Option<String>,
) -> Result<(String, String)> {
    let theme = ColorfulTheme::default();
    let branches: Vec<String> = repo.branches_with_heads()?.into_keys().collect();
    if branches.len() < 2 {
        return Err(StacksmithError::branch(
            "Need at least two branches to retarget",
        ));
    }

    let pick = |prompt: &str, default: usize| -> Result<String> {
        let choice = Select::with_theme(&theme)
            .with_prompt(prompt)
            .items(&branches)
            .default(default)
            .interact()
            .map_err(|e| StacksmithError::branch(format!("Prompt failed: {e}")))?;
        Ok(branches[choice].clone())
    };

    let branch = match branch {
        Some(branch) => branch,
        None => {
            let current = repo.current_branch()?;
            let default = current
                .and_then(|c| branches.iter().position(|b| *b == c))
                .unwrap_or(0);
            pick("Branch to rebase", default)?
        }
    };
    let target = pick("New base branch", 0)?;

    Ok((branch, target))
}
