use crate::errors::{Result, StacksmithError};
use crate::stack::RepoQuery;
use git2::{BranchType, Oid, Repository, Signature};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Wrapper around `git2::Repository` with the queries and mutations
/// stacksmith needs. All reads used by stack reconstruction are exposed
/// through the [`RepoQuery`] impl at the bottom.
pub struct GitRepository {
    repo: Repository,
    path: PathBuf,
}

impl GitRepository {
    /// Open a Git repository at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path)
            .map_err(|e| StacksmithError::repository(format!("Not a git repository: {e}")))?;

        let workdir = repo
            .workdir()
            .ok_or_else(|| StacksmithError::repository("Repository has no working directory"))?
            .to_path_buf();

        Ok(Self {
            repo,
            path: workdir,
        })
    }

    /// Working directory of the repository.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The repository's git directory (where the stack side-car lives).
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    /// Name of the checked out branch, `None` when HEAD is detached or
    /// the repository has no commits yet.
    pub fn current_branch(&self) -> Result<Option<String>> {
        match self.repo.head() {
            Ok(head) if head.is_branch() => Ok(head.shorthand().map(String::from)),
            Ok(_) => Ok(None),
            Err(e)
                if e.code() == git2::ErrorCode::UnbornBranch
                    || e.code() == git2::ErrorCode::NotFound =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// All local branches with their head commit ids, name-sorted.
    pub fn branches_with_heads(&self) -> Result<BTreeMap<String, String>> {
        let branches = self
            .repo
            .branches(Some(BranchType::Local))
            .map_err(|e| StacksmithError::repository(format!("Could not list branches: {e}")))?;

        let mut heads = BTreeMap::new();
        for branch in branches {
            let (branch, _) = branch.map_err(StacksmithError::Git)?;
            let name = match branch.name().map_err(StacksmithError::Git)? {
                Some(name) => name.to_string(),
                None => continue,
            };
            let commit = branch.get().peel_to_commit().map_err(|e| {
                StacksmithError::branch(format!("Could not get commit for branch '{name}': {e}"))
            })?;
            heads.insert(name, commit.id().to_string());
        }

        Ok(heads)
    }

    /// First parent of a commit; `None` for a root commit.
    pub fn first_parent_of(&self, commit: &str) -> Result<Option<String>> {
        let oid = Oid::from_str(commit).map_err(StacksmithError::Git)?;
        let commit = self.repo.find_commit(oid).map_err(StacksmithError::Git)?;

        if commit.parent_count() == 0 {
            Ok(None)
        } else {
            Ok(Some(commit.parent_id(0).map_err(StacksmithError::Git)?.to_string()))
        }
    }

    /// Local branches whose history contains `commit`, name-sorted.
    pub fn branches_containing(&self, commit: &str) -> Result<Vec<String>> {
        let target = Oid::from_str(commit).map_err(StacksmithError::Git)?;

        let mut containing = Vec::new();
        for (name, head) in self.branches_with_heads()? {
            let head_oid = Oid::from_str(&head).map_err(StacksmithError::Git)?;
            if head_oid == target
                || self
                    .repo
                    .graph_descendant_of(head_oid, target)
                    .map_err(StacksmithError::Git)?
            {
                containing.push(name);
            }
        }

        Ok(containing)
    }

    /// Commits unique to `child` vs. unique to `parent`.
    pub fn ahead_behind(&self, child: &str, parent: &str) -> Result<(usize, usize)> {
        let child_oid = self.branch_head_oid(child)?;
        let parent_oid = self.branch_head_oid(parent)?;
        self.repo
            .graph_ahead_behind(child_oid, parent_oid)
            .map_err(StacksmithError::Git)
    }

    /// Whether every commit of `child` is already in `parent`'s history.
    pub fn is_merged(&self, child: &str, parent: &str) -> Result<bool> {
        let child_oid = self.branch_head_oid(child)?;
        let parent_oid = self.branch_head_oid(parent)?;
        if child_oid == parent_oid {
            return Ok(true);
        }
        self.repo
            .graph_descendant_of(parent_oid, child_oid)
            .map_err(StacksmithError::Git)
    }

    /// Create a new branch pointing at `parent` (branch name, tag or
    /// commit id) and check it out.
    pub fn create_branch(&self, name: &str, parent: &str) -> Result<()> {
        let target = self.resolve_reference(parent)?;
        self.repo.branch(name, &target, false).map_err(|e| {
            StacksmithError::branch(format!("Could not create branch '{name}': {e}"))
        })?;
        self.checkout_branch(name)?;

        info!("Created branch '{name}' atop '{parent}'");
        Ok(())
    }

    /// Switch to a branch.
    pub fn checkout_branch(&self, name: &str) -> Result<()> {
        let branch = self.repo.find_branch(name, BranchType::Local).map_err(|e| {
            StacksmithError::branch(format!("Could not find branch '{name}': {e}"))
        })?;

        let tree = branch.get().peel_to_tree().map_err(|e| {
            StacksmithError::branch(format!("Could not get tree for branch '{name}': {e}"))
        })?;

        self.repo
            .checkout_tree(tree.as_object(), None)
            .map_err(|e| {
                StacksmithError::branch(format!("Could not checkout branch '{name}': {e}"))
            })?;

        self.repo
            .set_head(&format!("refs/heads/{name}"))
            .map_err(|e| {
                StacksmithError::branch(format!("Could not update HEAD to '{name}': {e}"))
            })?;

        debug!("Switched to branch '{name}'");
        Ok(())
    }

    /// Check if a local branch exists.
    pub fn branch_exists(&self, name: &str) -> bool {
        self.repo.find_branch(name, BranchType::Local).is_ok()
    }

    /// Fetch from remote origin.
    pub fn fetch(&self) -> Result<()> {
        info!("Fetching from origin");

        let mut remote = self
            .repo
            .find_remote("origin")
            .map_err(|e| StacksmithError::remote(format!("No remote 'origin' found: {e}")))?;

        let mut options = git2::FetchOptions::new();
        options.remote_callbacks(Self::credential_callbacks());
        remote
            .fetch::<&str>(&[], Some(&mut options), None)
            .map_err(|e| StacksmithError::remote(format!("Fetch failed: {e}")))?;

        debug!("Fetch completed");
        Ok(())
    }

    /// Force push a branch to origin. Force is required after a rebase,
    /// but the push is leased: during negotiation the server's advertised
    /// tip must match our remote-tracking ref, so commits pushed by
    /// someone else since our last fetch are never overwritten.
    pub fn push_branch(&self, branch: &str) -> Result<()> {
        info!("Pushing branch '{branch}'");

        let mut remote = self
            .repo
            .find_remote("origin")
            .map_err(|e| StacksmithError::remote(format!("No remote 'origin' found: {e}")))?;

        let expected = self.remote_tracking_oid(branch)?;
        let mut callbacks = Self::credential_callbacks();
        callbacks.push_negotiation(move |updates| {
            for update in updates {
                let advertised = update.src();
                // A zero source means the ref does not exist remotely
                // yet; creating it needs no lease.
                if advertised.is_zero() {
                    continue;
                }
                if Some(advertised) != expected {
                    return Err(git2::Error::from_str(
                        "remote branch has moved since the last fetch; fetch before pushing",
                    ));
                }
            }
            Ok(())
        });

        let refspec = format!("+refs/heads/{branch}:refs/heads/{branch}");
        let mut options = git2::PushOptions::new();
        options.remote_callbacks(callbacks);

        remote
            .push(&[&refspec], Some(&mut options))
            .map_err(|e| StacksmithError::remote(format!("Could not push '{branch}': {e}")))?;

        Ok(())
    }

    /// Local remote-tracking tip for `origin/<branch>`, the lease the
    /// next push is checked against.
    fn remote_tracking_oid(&self, branch: &str) -> Result<Option<Oid>> {
        match self
            .repo
            .refname_to_id(&format!("refs/remotes/origin/{branch}"))
        {
            Ok(oid) => Ok(Some(oid)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Push a branch and record `origin/<branch>` as its upstream.
    pub fn push_set_upstream(&self, branch: &str) -> Result<()> {
        self.push_branch(branch)?;

        let mut local = self.repo.find_branch(branch, BranchType::Local).map_err(|e| {
            StacksmithError::branch(format!("Could not find branch '{branch}': {e}"))
        })?;
        local
            .set_upstream(Some(&format!("origin/{branch}")))
            .map_err(|e| {
                StacksmithError::branch(format!("Could not set upstream for '{branch}': {e}"))
            })?;

        Ok(())
    }

    /// Upstream tracking branch (e.g. "origin/feature"), if configured.
    pub fn upstream_of(&self, branch: &str) -> Result<Option<String>> {
        let local = self.repo.find_branch(branch, BranchType::Local).map_err(|e| {
            StacksmithError::branch(format!("Could not find branch '{branch}': {e}"))
        })?;

        match local.upstream() {
            Ok(upstream) => Ok(upstream
                .name()
                .map_err(StacksmithError::Git)?
                .map(String::from)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Rebase `branch` onto `onto`. On conflict the rebase is aborted
    /// and a `Rebase` error returned; the branch is left untouched.
    pub fn rebase_branch(&self, branch: &str, onto: &str) -> Result<()> {
        info!("Rebasing '{branch}' onto '{onto}'");

        // Reload the index from disk; a cached in-memory index can be
        // stale after external writes and makes rebase init see a
        // phantom-dirty index.
        self.repo
            .index()
            .map_err(StacksmithError::Git)?
            .read(true)
            .map_err(StacksmithError::Git)?;

        let branch_ref = self.repo.find_branch(branch, BranchType::Local).map_err(|e| {
            StacksmithError::branch(format!("Could not find branch '{branch}': {e}"))
        })?;
        let branch_annotated = self
            .repo
            .reference_to_annotated_commit(branch_ref.get())
            .map_err(StacksmithError::Git)?;

        let onto_commit = self.resolve_reference(onto)?;
        let onto_annotated = self
            .repo
            .find_annotated_commit(onto_commit.id())
            .map_err(StacksmithError::Git)?;

        let signature = self.signature()?;
        let mut rebase = self
            .repo
            .rebase(Some(&branch_annotated), Some(&onto_annotated), None, None)
            .map_err(StacksmithError::Git)?;

        while let Some(operation) = rebase.next() {
            operation.map_err(StacksmithError::Git)?;

            if self.repo.index().map_err(StacksmithError::Git)?.has_conflicts() {
                rebase.abort().map_err(StacksmithError::Git)?;
                return Err(StacksmithError::rebase(format!(
                    "Conflicts while rebasing '{branch}' onto '{onto}'; rebase aborted"
                )));
            }

            match rebase.commit(None, &signature, None) {
                Ok(_) => {}
                // Patch already present upstream, nothing to replay.
                Err(e) if e.code() == git2::ErrorCode::Applied => {}
                Err(e) => {
                    let _ = rebase.abort();
                    return Err(e.into());
                }
            }
        }

        rebase.finish(Some(&signature)).map_err(StacksmithError::Git)?;
        self.checkout_branch(branch)?;

        info!("Rebased '{branch}' onto '{onto}'");
        Ok(())
    }

    /// Resolve a reference (branch name, tag, remote branch or commit
    /// hash) to a commit.
    pub fn resolve_reference(&self, reference: &str) -> Result<git2::Commit<'_>> {
        if let Ok(oid) = Oid::from_str(reference) {
            if let Ok(commit) = self.repo.find_commit(oid) {
                return Ok(commit);
            }
        }

        let object = self.repo.revparse_single(reference).map_err(|e| {
            StacksmithError::branch(format!("Could not resolve reference '{reference}': {e}"))
        })?;

        object.peel_to_commit().map_err(|e| {
            StacksmithError::branch(format!(
                "Reference '{reference}' does not point to a commit: {e}"
            ))
        })
    }

    fn branch_head_oid(&self, branch: &str) -> Result<Oid> {
        let branch = self.repo.find_branch(branch, BranchType::Local).map_err(|e| {
            StacksmithError::branch(format!("Could not find branch '{branch}': {e}"))
        })?;
        branch
            .get()
            .peel_to_commit()
            .map(|c| c.id())
            .map_err(StacksmithError::Git)
    }

    fn signature(&self) -> Result<Signature<'static>> {
        if let Ok(config) = self.repo.config() {
            if let (Ok(name), Ok(email)) = (
                config.get_string("user.name"),
                config.get_string("user.email"),
            ) {
                return Signature::now(&name, &email).map_err(StacksmithError::Git);
            }
        }

        Signature::now("Stacksmith", "stacksmith@local").map_err(StacksmithError::Git)
    }

    fn credential_callbacks() -> git2::RemoteCallbacks<'static> {
        let mut callbacks = git2::RemoteCallbacks::new();
        callbacks.credentials(|_url, username_from_url, _allowed_types| {
            if let Some(username) = username_from_url {
                git2::Cred::ssh_key_from_agent(username)
            } else {
                git2::Cred::default()
            }
        });
        callbacks
    }
}

impl RepoQuery for GitRepository {
    fn branches_with_heads(&self) -> Result<BTreeMap<String, String>> {
        GitRepository::branches_with_heads(self)
    }

    fn first_parent_of(&self, commit: &str) -> Result<Option<String>> {
        GitRepository::first_parent_of(self, commit)
    }

    fn branches_containing(&self, commit: &str) -> Result<Vec<String>> {
        GitRepository::branches_containing(self, commit)
    }

    fn current_branch(&self) -> Result<Option<String>> {
        GitRepository::current_branch(self)
    }

    fn ahead_behind(&self, child: &str, parent: &str) -> Result<(usize, usize)> {
        GitRepository::ahead_behind(self, child, parent)
    }

    fn is_merged(&self, child: &str, parent: &str) -> Result<bool> {
        GitRepository::is_merged(self, child, parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn init_repo() -> (TempDir, GitRepository) {
        let tmp = TempDir::new().unwrap();
        let raw = git2::Repository::init(tmp.path()).unwrap();
        commit_file(&raw, "README.md", "# Test", "Initial commit");

        // Default branch name depends on host config; pin it to main.
        let head = raw.head().unwrap().shorthand().unwrap().to_string();
        if head != "main" {
            raw.find_branch(&head, BranchType::Local)
                .unwrap()
                .rename("main", true)
                .unwrap();
            raw.set_head("refs/heads/main").unwrap();
        }

        let repo = GitRepository::open(tmp.path()).unwrap();
        (tmp, repo)
    }

    fn commit_file(repo: &git2::Repository, name: &str, content: &str, message: &str) -> Oid {
        let workdir = repo.workdir().unwrap();
        std::fs::write(workdir.join(name), content).unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();

        let sig = Signature::now("Test", "test@example.com").unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
    }

    fn raw(repo: &GitRepository) -> git2::Repository {
        git2::Repository::open(repo.path()).unwrap()
    }

    #[test]
    fn lists_branches_with_heads() {
        let (_tmp, repo) = init_repo();
        repo.create_branch("feature", "main").unwrap();

        let heads = repo.branches_with_heads().unwrap();
        assert_eq!(heads.len(), 2);
        assert_eq!(heads["feature"], heads["main"]);
        assert_eq!(heads["main"].len(), 40);
    }

    #[test]
    fn first_parent_of_root_commit_is_none() {
        let (_tmp, repo) = init_repo();
        let heads = repo.branches_with_heads().unwrap();
        assert_eq!(repo.first_parent_of(&heads["main"]).unwrap(), None);
    }

    #[test]
    fn first_parent_of_follows_ancestry() {
        let (_tmp, repo) = init_repo();
        let root = repo.branches_with_heads().unwrap()["main"].clone();
        let second = commit_file(&raw(&repo), "a.txt", "a", "Second commit");

        assert_eq!(
            repo.first_parent_of(&second.to_string()).unwrap(),
            Some(root)
        );
    }

    #[test]
    fn branches_containing_reports_all_descendants_sorted() {
        let (_tmp, repo) = init_repo();
        let root = repo.branches_with_heads().unwrap()["main"].clone();

        repo.create_branch("feature", "main").unwrap();
        commit_file(&raw(&repo), "f.txt", "f", "Feature work");

        let containing = repo.branches_containing(&root).unwrap();
        assert_eq!(containing, vec!["feature", "main"]);

        // The feature commit is only on feature.
        let feature_head = repo.branches_with_heads().unwrap()["feature"].clone();
        assert_eq!(repo.branches_containing(&feature_head).unwrap(), vec!["feature"]);
    }

    #[test]
    fn ahead_behind_counts_both_directions() {
        let (_tmp, repo) = init_repo();
        repo.create_branch("feature", "main").unwrap();
        commit_file(&raw(&repo), "f.txt", "f", "Feature work");

        assert_eq!(repo.ahead_behind("feature", "main").unwrap(), (1, 0));

        repo.checkout_branch("main").unwrap();
        commit_file(&raw(&repo), "m.txt", "m", "Main moved on");
        assert_eq!(repo.ahead_behind("feature", "main").unwrap(), (1, 1));
    }

    #[test]
    fn is_merged_detects_containment() {
        let (_tmp, repo) = init_repo();
        // Same commit counts as merged.
        repo.create_branch("twin", "main").unwrap();
        assert!(repo.is_merged("twin", "main").unwrap());

        repo.create_branch("feature", "main").unwrap();
        commit_file(&raw(&repo), "f.txt", "f", "Feature work");
        assert!(!repo.is_merged("feature", "main").unwrap());
        // But main is contained in feature.
        assert!(repo.is_merged("main", "feature").unwrap());
    }

    #[test]
    fn current_branch_tracks_checkout_and_detach() {
        let (_tmp, repo) = init_repo();
        repo.create_branch("feature", "main").unwrap();
        assert_eq!(repo.current_branch().unwrap().as_deref(), Some("feature"));

        repo.checkout_branch("main").unwrap();
        assert_eq!(repo.current_branch().unwrap().as_deref(), Some("main"));

        let head = raw(&repo).head().unwrap().peel_to_commit().unwrap().id();
        raw(&repo).set_head_detached(head).unwrap();
        assert_eq!(repo.current_branch().unwrap(), None);
    }

    #[test]
    fn create_branch_rejects_duplicates() {
        let (_tmp, repo) = init_repo();
        repo.create_branch("feature", "main").unwrap();
        assert!(repo.create_branch("feature", "main").is_err());
    }

    #[test]
    fn rebase_moves_branch_onto_new_base() {
        let (_tmp, repo) = init_repo();
        repo.create_branch("feature", "main").unwrap();
        commit_file(&raw(&repo), "f.txt", "f", "Feature work");

        repo.checkout_branch("main").unwrap();
        commit_file(&raw(&repo), "m.txt", "m", "Main moved on");

        repo.rebase_branch("feature", "main").unwrap();

        assert_eq!(repo.ahead_behind("feature", "main").unwrap(), (1, 0));
        assert!(repo.is_merged("main", "feature").unwrap());
        assert_eq!(repo.current_branch().unwrap().as_deref(), Some("feature"));
    }

    #[test]
    fn conflicting_rebase_is_aborted() {
        let (_tmp, repo) = init_repo();
        repo.create_branch("feature", "main").unwrap();
        commit_file(&raw(&repo), "shared.txt", "feature version", "Feature edit");

        repo.checkout_branch("main").unwrap();
        commit_file(&raw(&repo), "shared.txt", "main version", "Main edit");

        let before = repo.branches_with_heads().unwrap()["feature"].clone();
        let result = repo.rebase_branch("feature", "main");
        assert!(matches!(result, Err(StacksmithError::Rebase(_))));

        // Branch untouched after the aborted rebase.
        let after = repo.branches_with_heads().unwrap()["feature"].clone();
        assert_eq!(before, after);
    }

    #[test]
    fn upstream_of_unconfigured_branch_is_none() {
        let (_tmp, repo) = init_repo();
        assert_eq!(repo.upstream_of("main").unwrap(), None);
    }

    #[test]
    fn push_refuses_to_overwrite_an_unseen_remote_advance() {
        let (_tmp, repo) = init_repo();
        let remote_tmp = TempDir::new().unwrap();
        git2::Repository::init_bare(remote_tmp.path()).unwrap();
        raw(&repo)
            .remote("origin", remote_tmp.path().to_str().unwrap())
            .unwrap();

        // First push creates the remote branch and the tracking ref.
        repo.push_set_upstream("main").unwrap();

        // Someone else advances the remote behind our back.
        let bare = git2::Repository::open(remote_tmp.path()).unwrap();
        let old_tip = bare.refname_to_id("refs/heads/main").unwrap();
        let old_commit = bare.find_commit(old_tip).unwrap();
        let sig = Signature::now("Other", "other@example.com").unwrap();
        let their_tip = bare
            .commit(
                Some("refs/heads/main"),
                &sig,
                &sig,
                "Their work",
                &old_commit.tree().unwrap(),
                &[&old_commit],
            )
            .unwrap();

        commit_file(&raw(&repo), "ours.txt", "ours", "Our work");

        // The lease check refuses the push and their commit survives.
        assert!(matches!(
            repo.push_branch("main"),
            Err(StacksmithError::Remote(_))
        ));
        assert_eq!(bare.refname_to_id("refs/heads/main").unwrap(), their_tip);

        // After a fetch the advance has been seen, so the force push
        // goes through even though the histories diverged.
        repo.fetch().unwrap();
        repo.push_branch("main").unwrap();
        let local_tip = repo.branches_with_heads().unwrap()["main"].clone();
        assert_eq!(
            bare.refname_to_id("refs/heads/main").unwrap().to_string(),
            local_tip
        );
    }

    #[test]
    fn push_without_remote_is_a_remote_error() {
        let (_tmp, repo) = init_repo();
        assert!(matches!(
            repo.push_branch("main"),
            Err(StacksmithError::Remote(_))
        ));
        assert!(matches!(repo.fetch(), Err(StacksmithError::Remote(_))));
    }
}
