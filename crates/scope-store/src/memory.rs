use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use scope_types::{CodeTree, Subpath};

use crate::error::{StoreError, StoreResult};
use crate::traits::CodeTreeStore;

/// In-memory, HashMap-based code-tree store.
///
/// Intended for tests and ephemeral runs. Behaves exactly like the durable
/// backend except that nothing survives the process. Trees are cloned on
/// read/write.
pub struct InMemoryCodeTreeStore {
    trees: RwLock<HashMap<Subpath, CodeTree>>,
}

impl InMemoryCodeTreeStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            trees: RwLock::new(HashMap::new()),
        }
    }

    /// Number of trees currently stored.
    pub fn len(&self) -> usize {
        self.trees.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all trees from the store.
    pub fn clear(&self) {
        self.trees
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for InMemoryCodeTreeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeTreeStore for InMemoryCodeTreeStore {
    fn remember(&self, subpath: &Subpath, tree: &CodeTree) -> StoreResult<()> {
        let mut map = self.trees.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(subpath.clone(), tree.clone());
        Ok(())
    }

    fn recall(&self, subpath: &Subpath) -> StoreResult<CodeTree> {
        let map = self.trees.read().unwrap_or_else(PoisonError::into_inner);
        map.get(subpath)
            .cloned()
            .ok_or_else(|| StoreError::CodeTreeNotFound(subpath.clone()))
    }

    fn forget(&self, subpath: &Subpath) -> StoreResult<()> {
        let mut map = self.trees.write().unwrap_or_else(PoisonError::into_inner);
        map.remove(subpath);
        Ok(())
    }

    fn contains(&self, subpath: &Subpath) -> StoreResult<bool> {
        let map = self.trees.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.contains_key(subpath))
    }

    fn subpaths(&self) -> StoreResult<Vec<Subpath>> {
        let map = self.trees.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<Subpath> = map.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

impl std::fmt::Debug for InMemoryCodeTreeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCodeTreeStore")
            .field("tree_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sp(s: &str) -> Subpath {
        Subpath::parse(s).unwrap()
    }

    // -----------------------------------------------------------------------
    // Remember / recall / forget
    // -----------------------------------------------------------------------

    #[test]
    fn recall_forget_cycle() {
        let store = InMemoryCodeTreeStore::new();
        let key = sp("pkg/mod.py");
        let tree = CodeTree::from("TREE");

        match store.recall(&key) {
            Err(StoreError::CodeTreeNotFound(missing)) => assert_eq!(missing, key),
            other => panic!("expected CodeTreeNotFound, got {other:?}"),
        }

        store.remember(&key, &tree).unwrap();
        assert_eq!(store.recall(&key).unwrap(), tree);

        store.forget(&key).unwrap();
        assert!(matches!(
            store.recall(&key),
            Err(StoreError::CodeTreeNotFound(_))
        ));
    }

    #[test]
    fn remember_overwrites() {
        let store = InMemoryCodeTreeStore::new();
        let key = sp("module.py");
        store.remember(&key, &CodeTree::from("old")).unwrap();
        store.remember(&key, &CodeTree::from("new")).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.recall(&key).unwrap(), CodeTree::from("new"));
    }

    #[test]
    fn forget_missing_is_noop() {
        let store = InMemoryCodeTreeStore::new();
        store.forget(&sp("never.py")).unwrap();
        store.forget(&sp("never.py")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn forget_leaves_other_entries() {
        let store = InMemoryCodeTreeStore::new();
        store.remember(&sp("a.py"), &CodeTree::from("a")).unwrap();
        store.remember(&sp("b.py"), &CodeTree::from("b")).unwrap();
        store.forget(&sp("a.py")).unwrap();
        assert!(!store.contains(&sp("a.py")).unwrap());
        assert!(store.contains(&sp("b.py")).unwrap());
    }

    // -----------------------------------------------------------------------
    // Utility methods
    // -----------------------------------------------------------------------

    #[test]
    fn subpaths_are_sorted() {
        let store = InMemoryCodeTreeStore::new();
        store.remember(&sp("z.py"), &CodeTree::from("z")).unwrap();
        store.remember(&sp("a/b.py"), &CodeTree::from("ab")).unwrap();
        store.remember(&sp("m.py"), &CodeTree::from("m")).unwrap();
        let keys = store.subpaths().unwrap();
        assert_eq!(keys, vec![sp("a/b.py"), sp("m.py"), sp("z.py")]);
    }

    #[test]
    fn clear_removes_all() {
        let store = InMemoryCodeTreeStore::default();
        store.remember(&sp("a.py"), &CodeTree::from("a")).unwrap();
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn debug_format() {
        let store = InMemoryCodeTreeStore::new();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryCodeTreeStore"));
        assert!(debug.contains("tree_count"));
    }

    proptest! {
        #[test]
        fn remember_then_recall_returns_tree(
            parts in proptest::collection::vec("[a-z][a-z0-9_]{0,6}", 1..4),
            payload in proptest::collection::vec(any::<u8>(), 0..256),
        ) {
            let store = InMemoryCodeTreeStore::new();
            let key = Subpath::from_components(&parts).unwrap();
            let tree = CodeTree::new(payload);
            store.remember(&key, &tree).unwrap();
            prop_assert_eq!(store.recall(&key).unwrap(), tree);
        }
    }
}
