//! On-disk layout of a project's tool state.
//!
//! ```text
//! <root>/
//!   └── .pythoscope/
//!         ├── code-trees/<module-subpath>
//!         ├── points-of-entry/<name>
//!         ├── project.json
//!         └── config.toml
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use scope_types::Subpath;

/// Name of the state directory under the project root.
pub const STATE_DIR: &str = ".pythoscope";
/// Cached code trees, one artifact per module subpath.
pub const CODE_TREES_DIR: &str = "code-trees";
/// Source text of named points of entry.
pub const POINTS_OF_ENTRY_DIR: &str = "points-of-entry";
/// Saved project registry.
pub const PROJECT_FILE: &str = "project.json";
/// Optional user configuration.
pub const CONFIG_FILE: &str = "config.toml";

/// Create `path` and its parents.
///
/// A directory that already exists, including one created concurrently by
/// another process, is success. Any other failure (permissions, a regular file
/// in the way) is returned unchanged.
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(e),
    }
}

/// Resolves every tool-owned location for one project root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    pub fn code_trees_dir(&self) -> PathBuf {
        self.state_dir().join(CODE_TREES_DIR)
    }

    pub fn points_of_entry_dir(&self) -> PathBuf {
        self.state_dir().join(POINTS_OF_ENTRY_DIR)
    }

    pub fn project_file(&self) -> PathBuf {
        self.state_dir().join(PROJECT_FILE)
    }

    pub fn config_file(&self) -> PathBuf {
        self.state_dir().join(CONFIG_FILE)
    }

    /// Artifact location for a module's cached code tree.
    pub fn code_tree_path(&self, subpath: &Subpath) -> PathBuf {
        subpath.to_path(&self.code_trees_dir())
    }

    /// Source location of a named point of entry.
    pub fn point_of_entry_path(&self, name: &str) -> PathBuf {
        self.points_of_entry_dir().join(name)
    }

    /// Create the state directory tree. Safe to call repeatedly.
    pub fn init(&self) -> io::Result<()> {
        ensure_dir(&self.code_trees_dir())?;
        ensure_dir(&self.points_of_entry_dir())
    }
}
