use crate::errors::{Result, StacksmithError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Metadata persisted alongside the relationship map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreMetadata {
    /// Sticky once discovered; re-probed only if the branch disappears.
    #[serde(default)]
    pub main_branch: Option<String>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

/// The persisted stack state: child branch name to parent branch name,
/// plus metadata. Map semantics guarantee at most one parent per child.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackConfig {
    #[serde(default)]
    pub relationships: BTreeMap<String, String>,
    #[serde(default)]
    pub metadata: StoreMetadata,
}

impl StackConfig {
    /// Record (or overwrite) the parent of a child branch.
    pub fn record(&mut self, child: &str, parent: &str) {
        self.relationships
            .insert(child.to_string(), parent.to_string());
    }

    pub fn parent_of(&self, child: &str) -> Option<&str> {
        self.relationships.get(child).map(String::as_str)
    }

    pub fn forget(&mut self, child: &str) {
        self.relationships.remove(child);
    }

    /// Self-healing: drop every relationship whose child branch no longer
    /// exists. Returns how many entries were removed. Pure, no I/O.
    pub fn heal(&mut self, existing: &BTreeSet<String>) -> usize {
        let before = self.relationships.len();
        self.relationships.retain(|child, _| existing.contains(child));
        before - self.relationships.len()
    }
}

/// Load/save access to the persisted stack state. Injected into the
/// builder so tests can swap the filesystem for memory.
pub trait RelationshipStore {
    /// An absent store is the first-run case and yields an empty config;
    /// a present-but-unparseable store is `StoreCorrupt`.
    fn load(&self) -> Result<StackConfig>;

    /// Persist the config, stamping `last_updated` with the current time.
    fn save(&self, config: &mut StackConfig) -> Result<()>;
}

/// File-backed store: a JSON side-car under the repository's git
/// directory (`.git/stacksmith/stack.json`), one per repository.
pub struct FileRelationshipStore {
    path: PathBuf,
}

impl FileRelationshipStore {
    const STORE_DIR: &'static str = "stacksmith";
    const STORE_FILE: &'static str = "stack.json";

    /// Store rooted at the given git directory (the `.git` path).
    pub fn new(git_dir: &Path) -> Self {
        Self {
            path: git_dir.join(Self::STORE_DIR).join(Self::STORE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RelationshipStore for FileRelationshipStore {
    fn load(&self) -> Result<StackConfig> {
        if !self.path.exists() {
            return Ok(StackConfig::default());
        }

        let data = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&data).map_err(|e| {
            StacksmithError::store_corrupt(format!(
                "could not parse {}: {e}",
                self.path.display()
            ))
        })
    }

    fn save(&self, config: &mut StackConfig) -> Result<()> {
        config.metadata.last_updated = Some(Utc::now());

        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let data = serde_json::to_string_pretty(config)?;
        std::fs::write(&self.path, data)?;

        tracing::debug!("Saved stack config to {}", self.path.display());
        Ok(())
    }
}

/// In-memory store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryRelationshipStore {
    state: RefCell<StackConfig>,
}

impl MemoryRelationshipStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: StackConfig) -> Self {
        Self {
            state: RefCell::new(config),
        }
    }

    /// A copy of the last saved state.
    pub fn snapshot(&self) -> StackConfig {
        self.state.borrow().clone()
    }
}

impl RelationshipStore for MemoryRelationshipStore {
    fn load(&self) -> Result<StackConfig> {
        Ok(self.state.borrow().clone())
    }

    fn save(&self, config: &mut StackConfig) -> Result<()> {
        config.metadata.last_updated = Some(Utc::now());
        *self.state.borrow_mut() = config.clone();
        Ok(())
    }
}
