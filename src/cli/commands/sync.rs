use crate::cli::output::Output;
use crate::errors::{Result, StacksmithError};
use crate::git::{self, GitRepository};
use crate::stack::{FileRelationshipStore, StackBuilder};
use crate::utils::spinner::Spinner;

/// Rebase and push a chain of branches in parent-to-child order.
///
/// With fewer than two branches given, the chain is derived from the
/// reconstructed stack: the path from the root down to the named
/// branch, or to the current branch when none is named.
pub fn run(branches: Vec<String>) -> Result<()> {
    let repo = git::get_current_repository()?;

    let chain = if branches.len() >= 2 {
        branches
    } else {
        derive_chain(&repo, branches.into_iter().next())?
    };

    if chain.len() < 2 {
        Output::info("Nothing to sync: the current branch has no parent in the stack");
        Output::tip("Pass branches explicitly: stacksmith sync <parent> <child> [...]");
        return Ok(());
    }

    for name in &chain {
        if !repo.branch_exists(name) {
            return Err(StacksmithError::branch(format!("Branch '{name}' not found")));
        }
    }

    Output::info(format!("Syncing stack: {}", chain.join(" → ")));

    for pair in chain.windows(2) {
        let (parent, child) = (&pair[0], &pair[1]);
        sync_one(&repo, child, parent)?;
    }

    Output::success("Stack sync complete");
    Ok(())
}

fn sync_one(repo: &GitRepository, child: &str, parent: &str) -> Result<()> {
    let spinner = Spinner::new(format!("Rebasing {child} onto {parent}..."));

    repo.checkout_branch(child)?;
    repo.fetch()?;
    repo.rebase_branch(child, parent)?;
    spinner.update_message(format!("Pushing {child}..."));
    repo.push_branch(child)?;

    spinner.stop();
    Output::push_success(child);
    Ok(())
}

fn derive_chain(repo: &GitRepository, tip: Option<String>) -> Result<Vec<String>> {
    let tip = match tip {
        Some(name) => {
            if !repo.branch_exists(&name) {
                return Err(StacksmithError::branch(format!("Branch '{name}' not found")));
            }
            name
        }
        None => repo
            .current_branch()?
            .ok_or_else(|| StacksmithError::branch("Not on a branch (detached HEAD?)"))?,
    };

    let store = FileRelationshipStore::new(repo.git_dir());
    let stack = StackBuilder::new(&store).build(repo)?;

    Ok(stack.path_to(&tip))
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;
    use std::path::Path;
    use tempfile::TempDir;

    fn commit_file(repo: &git2::Repository, name: &str, content: &str, message: &str) {
        let workdir = repo.workdir().unwrap();
        std::fs::write(workdir.join(name), content).unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();

        let sig = Signature::now("Test", "test@example.com").unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap();
    }

    /// main <- feature-a <- feature-b, HEAD on feature-b.
    fn stacked_repo() -> (TempDir, GitRepository) {
        let tmp = TempDir::new().unwrap();
        let raw = git2::Repository::init(tmp.path()).unwrap();
        commit_file(&raw, "README.md", "# Test", "Initial commit");

        let head = raw.head().unwrap().shorthand().unwrap().to_string();
        if head != "main" {
            raw.find_branch(&head, git2::BranchType::Local)
                .unwrap()
                .rename("main", true)
                .unwrap();
            raw.set_head("refs/heads/main").unwrap();
        }

        let repo = GitRepository::open(tmp.path()).unwrap();
        repo.create_branch("feature-a", "main").unwrap();
        commit_file(&raw, "a.txt", "a", "Add a");
        repo.create_branch("feature-b", "feature-a").unwrap();
        commit_file(&raw, "b.txt", "b", "Add b");
        (tmp, repo)
    }

    #[test]
    fn chain_ends_at_the_named_branch() {
        let (_tmp, repo) = stacked_repo();
        let chain = derive_chain(&repo, Some("feature-a".to_string())).unwrap();
        assert_eq!(chain, vec!["main", "feature-a"]);
    }

    #[test]
    fn chain_defaults_to_the_current_branch() {
        let (_tmp, repo) = stacked_repo();
        let chain = derive_chain(&repo, None).unwrap();
        assert_eq!(chain, vec!["main", "feature-a", "feature-b"]);
    }

    #[test]
    fn unknown_branch_is_rejected() {
        let (_tmp, repo) = stacked_repo();
        assert!(matches!(
            derive_chain(&repo, Some("nope".to_string())),
            Err(StacksmithError::Branch(_))
        ));
    }
}
