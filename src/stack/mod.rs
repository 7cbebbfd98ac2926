//! Branch stack reconstruction
//!
//! This module implements the core of stacksmith: rebuilding the
//! parent/child tree of stacked branches from the repository's current
//! state plus a persisted relationship file, and keeping that file
//! healthy as branches are created, rebased and deleted outside our
//! control.

pub mod builder;
pub mod stack;
pub mod store;

pub use builder::{RepoQuery, StackBuilder, DEFAULT_MAIN_CANDIDATES};
pub use stack::{BranchNode, BranchStack};
pub use store::{
    FileRelationshipStore, MemoryRelationshipStore, RelationshipStore, StackConfig,
};
