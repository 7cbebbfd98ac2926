use crate::cli::output::Output;
use crate::errors::Result;
use crate::git::{self, GitRepository};
use crate::stack::{FileRelationshipStore, RelationshipStore};
use dialoguer::{theme::ColorfulTheme, Input, Select};

/// Create a new branch atop a parent and record the relationship so the
/// stack tree knows about it without having to infer it later.
pub fn run(new_branch: Option<String>, parent_branch: Option<String>) -> Result<()> {
    let repo = git::get_current_repository()?;

    let (new_branch, parent_branch) = match (new_branch, parent_branch) {
        (Some(new), Some(parent)) => (new, parent),
        (new, _) => prompt_for_branches(&repo, new)?,
    };

    repo.create_branch(&new_branch, &parent_branch)?;
    record_relationship(&repo, &new_branch, &parent_branch);

    Output::forge_success(&new_branch, &parent_branch);
    Ok(())
}

fn prompt_for_branches(
    repo: &GitRepository,
    new_branch: Option<String>,
) -> Result<(String, String)> {
    let theme = ColorfulTheme::default();

    let new_branch = match new_branch {
        Some(name) => name,
        None => Input::with_theme(&theme)
            .with_prompt("New branch name")
            .validate_with(|input: &String| {
                if input.trim().is_empty() {
                    Err("branch name cannot be empty")
                } else {
                    Ok(())
                }
            })
            .interact_text()
            .map_err(|e| crate::errors::StacksmithError::branch(format!("Prompt failed: {e}")))?,
    };

    let branches: Vec<String> = repo.branches_with_heads()?.into_keys().collect();
    if branches.is_empty() {
        return Err(crate::errors::StacksmithError::branch(
            "No branches to stack on; create an initial commit first",
        ));
    }

    let current = repo.current_branch()?;
    let default = current
        .and_then(|c| branches.iter().position(|b| *b == c))
        .unwrap_or(0);

    let choice = Select::with_theme(&theme)
        .with_prompt("Parent branch")
        .items(&branches)
        .default(default)
        .interact()
        .map_err(|e| crate::errors::StacksmithError::branch(format!("Prompt failed: {e}")))?;

    Ok((new_branch, branches[choice].clone()))
}

/// Best-effort: branch creation already succeeded, so a store hiccup
/// only costs us a re-inference on the next tree build.
fn record_relationship(repo: &GitRepository, child: &str, parent: &str) {
    let store = FileRelationshipStore::new(repo.git_dir());
    let mut config = match store.load() {
        Ok(config) => config,
        Err(e) => {
            Output::warning(format!("Could not load stack config: {e}"));
            return;
        }
    };

    config.record(child, parent);
    if let Err(e) = store.save(&mut config) {
        Output::warning(format!("Could not save stack config: {e}"));
    }
}
