use std::collections::BTreeMap;

/// A local branch and the commit it currently points to. Sampled fresh
/// from the repository on every reconstruction and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRef {
    pub name: String,
    pub head: String,
}

/// A branch head commit together with its first parent, if any. Only
/// used while inferring relationships; discarded once the tree is built.
#[derive(Debug, Clone)]
pub struct CommitLineage {
    pub head: String,
    pub first_parent: Option<String>,
}

/// One branch in the reconstructed stack tree.
///
/// Nodes are keyed by branch name inside [`BranchStack::nodes`]; `parent`
/// and `children` refer to other nodes by name, so the tree carries no
/// shared ownership and a cycle cannot be represented twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchNode {
    pub name: String,
    pub head: String,
    /// Resolved parent branch, either from the persisted file or freshly
    /// inferred. `None` for roots and orphans.
    pub parent: Option<String>,
    /// Child branches in the order they were attached.
    pub children: Vec<String>,
    pub is_head: bool,
    pub is_orphan: bool,
    /// Commits unique to this branch vs. its parent. Zero unless the
    /// parent edge was resolved and the count could be computed.
    pub ahead: usize,
    pub behind: usize,
    pub is_merged: bool,
}

impl BranchNode {
    pub(crate) fn new(name: String, head: String) -> Self {
        Self {
            name,
            head,
            parent: None,
            children: Vec::new(),
            is_head: false,
            is_orphan: false,
            ahead: 0,
            behind: 0,
            is_merged: false,
        }
    }
}

/// The reconstructed tree of stacked branches: the engine's output.
///
/// Rebuilt from scratch on every run; every existing branch appears in
/// `nodes` exactly once, and in exactly one of `roots`, `orphans`, or some
/// node's `children`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchStack {
    /// Root branches, main branch first when one exists.
    pub roots: Vec<String>,
    /// Branches with no discoverable parent and no children.
    pub orphans: Vec<String>,
    pub nodes: BTreeMap<String, BranchNode>,
    pub main_branch: Option<String>,
}

impl BranchStack {
    pub fn node(&self, name: &str) -> Option<&BranchNode> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// The branch currently checked out, if it is part of the stack.
    pub fn head_branch(&self) -> Option<&BranchNode> {
        self.nodes.values().find(|n| n.is_head)
    }

    /// Walk parent links from `name` up to its root and return the chain
    /// in root-first order, ending with `name` itself.
    pub fn path_to(&self, name: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut cursor = self.nodes.get(name);
        while let Some(node) = cursor {
            chain.push(node.name.clone());
            cursor = node.parent.as_deref().and_then(|p| self.nodes.get(p));
        }
        chain.reverse();
        chain
    }
}
