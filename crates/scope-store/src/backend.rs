use serde::{Deserialize, Serialize};

use crate::file::FileCodeTreeStore;
use crate::layout::ProjectLayout;
use crate::memory::InMemoryCodeTreeStore;
use crate::traits::CodeTreeStore;

/// Which code-tree backend a project uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Trees persist under `<root>/.pythoscope/code-trees`.
    #[default]
    Durable,
    /// Trees live in memory and vanish with the process.
    Volatile,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Durable => write!(f, "durable"),
            Self::Volatile => write!(f, "volatile"),
        }
    }
}

/// Construct the store selected by `backend` for a project layout.
pub fn open_store(backend: StoreBackend, layout: &ProjectLayout) -> Box<dyn CodeTreeStore> {
    match backend {
        StoreBackend::Durable => Box::new(FileCodeTreeStore::for_layout(layout)),
        StoreBackend::Volatile => Box::new(InMemoryCodeTreeStore::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scope_types::{CodeTree, Subpath};

    #[test]
    fn default_is_durable() {
        assert_eq!(StoreBackend::default(), StoreBackend::Durable);
        assert_eq!(StoreBackend::Durable.to_string(), "durable");
    }

    #[test]
    fn durable_backend_writes_to_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(tmp.path());
        let store = open_store(StoreBackend::Durable, &layout);
        let key = Subpath::parse("module.py").unwrap();
        store.remember(&key, &CodeTree::from("tree")).unwrap();
        assert!(layout.code_tree_path(&key).is_file());
    }

    #[test]
    fn volatile_backend_leaves_disk_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(tmp.path());
        let store = open_store(StoreBackend::Volatile, &layout);
        let key = Subpath::parse("module.py").unwrap();
        store.remember(&key, &CodeTree::from("tree")).unwrap();
        assert_eq!(store.recall(&key).unwrap(), CodeTree::from("tree"));
        assert!(!layout.state_dir().exists());
    }
}
