use crate::errors::Result;
use crate::stack::stack::{BranchNode, BranchRef, BranchStack, CommitLineage};
use crate::stack::store::RelationshipStore;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

/// Read-only repository queries the reconstruction engine consumes.
///
/// Implemented by [`crate::git::GitRepository`] for real repositories and
/// by scripted fakes in tests. The engine never cares how the answers are
/// produced.
pub trait RepoQuery {
    /// All local branches with their current head commit ids.
    fn branches_with_heads(&self) -> Result<BTreeMap<String, String>>;

    /// First parent of a commit, `None` for a root commit.
    fn first_parent_of(&self, commit: &str) -> Result<Option<String>>;

    /// Branch names whose history contains `commit`, in lexicographic
    /// order so reconstruction stays deterministic.
    fn branches_containing(&self, commit: &str) -> Result<Vec<String>>;

    /// The currently checked out branch, `None` when HEAD is detached.
    fn current_branch(&self) -> Result<Option<String>>;

    /// Commits unique to `child` vs. unique to `parent`.
    fn ahead_behind(&self, child: &str, parent: &str) -> Result<(usize, usize)>;

    /// Whether `child` is fully contained in `parent`'s history.
    fn is_merged(&self, child: &str, parent: &str) -> Result<bool>;
}

/// Canonical main-branch names probed, in order, when the store has no
/// sticky main branch yet.
pub const DEFAULT_MAIN_CANDIDATES: &[&str] = &["main", "master"];

/// Rebuilds the branch stack tree from the repository's current branches
/// and commit ancestry plus the persisted relationship file.
///
/// Parent inference is a best-effort heuristic: commit ancestry does not
/// uniquely determine which branch is whose parent, so when several
/// branches contain the same fork point the lexicographically first
/// resolvable candidate wins. Once a relationship is inferred it is
/// persisted, so later runs reuse it instead of re-guessing.
pub struct StackBuilder<'a> {
    store: &'a dyn RelationshipStore,
    main_candidates: Vec<String>,
}

impl<'a> StackBuilder<'a> {
    pub fn new(store: &'a dyn RelationshipStore) -> Self {
        Self {
            store,
            main_candidates: DEFAULT_MAIN_CANDIDATES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Override the canonical main-branch probe list.
    pub fn with_main_candidates<I, S>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.main_candidates = candidates.into_iter().map(Into::into).collect();
        self.main_candidates.retain(|c| !c.is_empty());
        self
    }

    /// Reconstruct the stack tree and persist updated relationships.
    ///
    /// Fails only when the initial branch enumeration fails or the
    /// persisted store is corrupt. Per-branch lookup failures and a
    /// failing final save degrade to warnings.
    pub fn build(&self, repo: &dyn RepoQuery) -> Result<BranchStack> {
        let heads = repo.branches_with_heads()?;
        let refs: Vec<BranchRef> = heads
            .iter()
            .map(|(name, head)| BranchRef {
                name: name.clone(),
                head: head.clone(),
            })
            .collect();

        // Ancestry per branch head. A failed lookup leaves the branch in
        // the set; it can then only be placed via a persisted hint.
        let mut lineage: HashMap<String, CommitLineage> = HashMap::new();
        for branch in &refs {
            match repo.first_parent_of(&branch.head) {
                Ok(first_parent) => {
                    lineage.insert(
                        branch.name.clone(),
                        CommitLineage {
                            head: branch.head.clone(),
                            first_parent,
                        },
                    );
                }
                Err(e) => {
                    warn!("Could not resolve parent commit of '{}': {e}", branch.name);
                }
            }
        }

        let mut config = self.store.load()?;

        let existing: BTreeSet<String> = heads.keys().cloned().collect();
        let healed = config.heal(&existing);
        if healed > 0 {
            debug!("Pruned {healed} relationship(s) for deleted branches");
        }

        // Sticky main branch, re-probed when it no longer exists.
        let main_branch = match config.metadata.main_branch.as_ref() {
            Some(name) if existing.contains(name) => Some(name.clone()),
            _ => self
                .main_candidates
                .iter()
                .find(|c| existing.contains(*c))
                .cloned(),
        };
        config.metadata.main_branch = main_branch.clone();

        let mut nodes: BTreeMap<String, BranchNode> = refs
            .into_iter()
            .map(|r| (r.name.clone(), BranchNode::new(r.name, r.head)))
            .collect();
        let mut parent_of: HashMap<String, String> = HashMap::new();

        // Apply healed persisted relationships first.
        let persisted: Vec<(String, String)> = config
            .relationships
            .iter()
            .map(|(c, p)| (c.clone(), p.clone()))
            .collect();
        for (child, parent) in persisted {
            if main_branch.as_deref() == Some(child.as_str()) {
                // Main is a sentinel root, never anyone's child.
                debug!("Ignoring persisted parent for main branch '{child}'");
                config.forget(&child);
                continue;
            }
            if !nodes.contains_key(&parent) {
                debug!("Parent '{parent}' of '{child}' is gone, dropping relationship");
                config.forget(&child);
                continue;
            }
            if would_cycle(&parent_of, &child, &parent) {
                warn!("Persisted relationship {child} -> {parent} would form a cycle, dropping");
                config.forget(&child);
                continue;
            }
            attach(&mut nodes, &mut parent_of, &child, &parent);
        }

        // Heuristic inference for everything still unplaced.
        let unresolved: Vec<String> = nodes
            .keys()
            .filter(|name| {
                !parent_of.contains_key(*name) && main_branch.as_deref() != Some(name.as_str())
            })
            .cloned()
            .collect();
        for child in unresolved {
            let first_parent = match lineage.get(&child).and_then(|l| l.first_parent.as_deref()) {
                Some(fp) => fp.to_string(),
                None => continue,
            };

            for parent in parent_candidates(&child, &first_parent, &nodes, repo) {
                if would_cycle(&parent_of, &child, &parent) {
                    debug!("Skipping inferred parent '{parent}' for '{child}': would form a cycle");
                    continue;
                }
                debug!("Inferred parent of '{child}': '{parent}'");
                attach(&mut nodes, &mut parent_of, &child, &parent);
                config.record(&child, &parent);
                break;
            }
        }

        // Classify what is left: parentless with children is a root,
        // parentless and childless is an orphan.
        let mut roots = Vec::new();
        let mut orphans = Vec::new();
        if let Some(main) = &main_branch {
            roots.push(main.clone());
        }
        let names: Vec<String> = nodes.keys().cloned().collect();
        for name in names {
            if parent_of.contains_key(&name) || main_branch.as_deref() == Some(name.as_str()) {
                continue;
            }
            if nodes[&name].children.is_empty() {
                nodes.get_mut(&name).expect("node exists").is_orphan = true;
                orphans.push(name);
            } else {
                roots.push(name);
            }
        }

        match repo.current_branch() {
            Ok(Some(current)) => {
                if let Some(node) = nodes.get_mut(&current) {
                    node.is_head = true;
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Could not determine current branch: {e}"),
        }

        // Sync annotations per resolved edge; failures keep defaults.
        let mut edges: Vec<(String, String)> = parent_of.into_iter().collect();
        edges.sort();
        for (child, parent) in edges {
            match repo.ahead_behind(&child, &parent) {
                Ok((ahead, behind)) => {
                    let node = nodes.get_mut(&child).expect("node exists");
                    node.ahead = ahead;
                    node.behind = behind;
                }
                Err(e) => warn!("Could not compute ahead/behind for '{child}': {e}"),
            }
            match repo.is_merged(&child, &parent) {
                Ok(merged) => nodes.get_mut(&child).expect("node exists").is_merged = merged,
                Err(e) => warn!("Could not check merge status of '{child}': {e}"),
            }
        }

        if let Err(e) = self.store.save(&mut config) {
            warn!("Failed to save stack config: {e}");
        }

        Ok(BranchStack {
            roots,
            orphans,
            nodes,
            main_branch,
        })
    }
}

fn attach(
    nodes: &mut BTreeMap<String, BranchNode>,
    parent_of: &mut HashMap<String, String>,
    child: &str,
    parent: &str,
) {
    nodes
        .get_mut(parent)
        .expect("parent exists")
        .children
        .push(child.to_string());
    nodes.get_mut(child).expect("child exists").parent = Some(parent.to_string());
    parent_of.insert(child.to_string(), parent.to_string());
}

/// True if setting `parent` as the parent of `child` would revisit
/// `child` somewhere up the provisional ancestor chain.
fn would_cycle(parent_of: &HashMap<String, String>, child: &str, parent: &str) -> bool {
    let mut cursor = Some(parent.to_string());
    while let Some(name) = cursor {
        if name == child {
            return true;
        }
        cursor = parent_of.get(&name).cloned();
    }
    false
}

/// Candidate parents for `child`, best first: branches whose head *is*
/// the child's fork point, then (only if none match exactly) branches
/// whose history merely contains it.
fn parent_candidates(
    child: &str,
    first_parent: &str,
    nodes: &BTreeMap<String, BranchNode>,
    repo: &dyn RepoQuery,
) -> Vec<String> {
    let direct: Vec<String> = nodes
        .iter()
        .filter(|(name, node)| name.as_str() != child && node.head == first_parent)
        .map(|(name, _)| name.clone())
        .collect();
    if !direct.is_empty() {
        return direct;
    }

    match repo.branches_containing(first_parent) {
        Ok(containing) => containing
            .into_iter()
            .filter(|name| name != child && nodes.contains_key(name))
            .collect(),
        Err(e) => {
            warn!("Containment lookup failed for '{child}': {e}");
            Vec::new()
        }
    }
}
