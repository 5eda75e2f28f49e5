use scope_types::{CodeTree, Subpath};

use crate::error::{StoreError, StoreResult};

/// Per-module code-tree cache.
///
/// All implementations must satisfy these invariants:
/// - At most one tree is stored per subpath. `remember` overwrites.
/// - `recall` of an absent subpath fails with
///   [`StoreError::CodeTreeNotFound`]. It never returns a default tree.
/// - `forget` of an absent subpath succeeds.
/// - The store never interprets trees and never checks source freshness.
pub trait CodeTreeStore: Send + Sync {
    /// Store the tree for `subpath`, replacing any previous one.
    fn remember(&self, subpath: &Subpath, tree: &CodeTree) -> StoreResult<()>;

    /// Return the tree stored for `subpath`.
    fn recall(&self, subpath: &Subpath) -> StoreResult<CodeTree>;

    /// Remove the tree stored for `subpath`, if any.
    fn forget(&self, subpath: &Subpath) -> StoreResult<()>;

    /// Check whether a tree is stored for `subpath`.
    ///
    /// Default implementation recalls the tree. Backends may override with a
    /// cheaper check.
    fn contains(&self, subpath: &Subpath) -> StoreResult<bool> {
        match self.recall(subpath) {
            Ok(_) => Ok(true),
            Err(StoreError::CodeTreeNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// All subpaths with a stored tree, sorted.
    fn subpaths(&self) -> StoreResult<Vec<Subpath>>;
}
