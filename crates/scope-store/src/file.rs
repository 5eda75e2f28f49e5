use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use scope_types::{CodeTree, Subpath, TreeDigest};

use crate::error::{StoreError, StoreResult};
use crate::layout::{ensure_dir, ProjectLayout};
use crate::traits::CodeTreeStore;

/// Current artifact format version.
const FORMAT_VERSION: u32 = 1;

/// Prefix of in-flight temp files; never reported as stored trees.
const TEMP_PREFIX: &str = ".tmp";

/// On-disk artifact: one per module.
///
/// Encoded with bincode:
/// ```text
/// [format_version: u32][digest: 32 bytes][payload: length-prefixed bytes]
/// ```
#[derive(Serialize, Deserialize)]
struct Artifact {
    format_version: u32,
    digest: TreeDigest,
    payload: Vec<u8>,
}

/// Durable code-tree store rooted at a cache directory.
///
/// Each tree lives at `<dir>/<subpath>`, so `pkg/mod.py` is cached at
/// `<dir>/pkg/mod.py`. Writes go through a temp file in the target directory
/// followed by an atomic rename; readers see either the previous artifact or
/// the new one. Every read recomputes the payload digest.
pub struct FileCodeTreeStore {
    dir: PathBuf,
}

impl FileCodeTreeStore {
    /// Open a store at an explicit cache directory.
    ///
    /// The directory is created lazily on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Open the store at a project's `.pythoscope/code-trees` directory.
    pub fn for_layout(layout: &ProjectLayout) -> Self {
        Self::new(layout.code_trees_dir())
    }

    /// The cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of stored trees.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.subpaths()?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    fn artifact_path(&self, subpath: &Subpath) -> PathBuf {
        subpath.to_path(&self.dir)
    }

    fn decode(subpath: &Subpath, bytes: &[u8]) -> StoreResult<CodeTree> {
        let artifact: Artifact =
            bincode::deserialize(bytes).map_err(|e| StoreError::CorruptTree {
                subpath: subpath.clone(),
                reason: format!("undecodable artifact: {e}"),
            })?;
        if artifact.format_version != FORMAT_VERSION {
            return Err(StoreError::CorruptTree {
                subpath: subpath.clone(),
                reason: format!(
                    "unsupported format version {} (expected {FORMAT_VERSION})",
                    artifact.format_version
                ),
            });
        }
        let tree = CodeTree::new(artifact.payload);
        let computed = tree.digest();
        if computed != artifact.digest {
            return Err(StoreError::CorruptTree {
                subpath: subpath.clone(),
                reason: format!(
                    "digest mismatch: stored {}, computed {}",
                    artifact.digest.short_hex(),
                    computed.short_hex()
                ),
            });
        }
        Ok(tree)
    }
}

impl CodeTreeStore for FileCodeTreeStore {
    fn remember(&self, subpath: &Subpath, tree: &CodeTree) -> StoreResult<()> {
        let path = self.artifact_path(subpath);
        let parent = path.parent().unwrap_or(&self.dir);
        ensure_dir(parent)?;

        let artifact = Artifact {
            format_version: FORMAT_VERSION,
            digest: tree.digest(),
            payload: tree.payload().to_vec(),
        };
        let bytes =
            bincode::serialize(&artifact).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(parent)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;

        debug!(subpath = %subpath, bytes = bytes.len(), "code tree remembered");
        Ok(())
    }

    fn recall(&self, subpath: &Subpath) -> StoreResult<CodeTree> {
        let path = self.artifact_path(subpath);
        // A directory, or a path running through a file, holds no tree.
        if !path.is_file() {
            return Err(StoreError::CodeTreeNotFound(subpath.clone()));
        }
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::CodeTreeNotFound(subpath.clone()));
            }
            Err(e) => return Err(StoreError::Io(e)),
        };
        let tree = Self::decode(subpath, &bytes);
        if let Err(StoreError::CorruptTree { reason, .. }) = &tree {
            warn!(subpath = %subpath, %reason, "ignoring corrupt code tree artifact");
        }
        tree
    }

    fn forget(&self, subpath: &Subpath) -> StoreResult<()> {
        let path = self.artifact_path(subpath);
        if !path.is_file() {
            return Ok(());
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(subpath = %subpath, "code tree forgotten");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn contains(&self, subpath: &Subpath) -> StoreResult<bool> {
        Ok(self.artifact_path(subpath).is_file())
    }

    fn subpaths(&self) -> StoreResult<Vec<Subpath>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in WalkDir::new(&self.dir).min_depth(1) {
            let entry = entry.map_err(|e| {
                StoreError::Io(
                    e.into_io_error()
                        .unwrap_or_else(|| io::Error::other("filesystem loop in cache directory")),
                )
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX) {
                continue;
            }
            let relative = entry.path().strip_prefix(&self.dir).unwrap_or(entry.path());
            match Subpath::from_path(&self.dir, relative) {
                Ok(subpath) => keys.push(subpath),
                Err(e) => warn!(path = %entry.path().display(), error = %e, "skipping cache entry"),
            }
        }
        keys.sort();
        Ok(keys)
    }
}

impl std::fmt::Debug for FileCodeTreeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCodeTreeStore")
            .field("dir", &self.dir)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sp(s: &str) -> Subpath {
        Subpath::parse(s).unwrap()
    }

    fn store_in(tmp: &tempfile::TempDir) -> FileCodeTreeStore {
        FileCodeTreeStore::for_layout(&ProjectLayout::new(tmp.path()))
    }

    // -----------------------------------------------------------------------
    // Core behavior
    // -----------------------------------------------------------------------

    #[test]
    fn recall_forget_cycle() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        let key = sp("pkg/mod.py");
        let tree = CodeTree::from("TREE");

        assert!(matches!(
            store.recall(&key),
            Err(StoreError::CodeTreeNotFound(ref missing)) if *missing == key
        ));
        store.remember(&key, &tree).unwrap();
        assert_eq!(store.recall(&key).unwrap(), tree);
        store.forget(&key).unwrap();
        assert!(matches!(
            store.recall(&key),
            Err(StoreError::CodeTreeNotFound(_))
        ));
    }

    #[test]
    fn nested_subpath_maps_to_nested_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        store
            .remember(&sp("pkg/sub/mod.py"), &CodeTree::from("x"))
            .unwrap();
        let expected = tmp
            .path()
            .join(".pythoscope")
            .join("code-trees")
            .join("pkg")
            .join("sub")
            .join("mod.py");
        assert!(expected.is_file());
    }

    #[test]
    fn forget_missing_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        store.forget(&sp("never/written.py")).unwrap();
        store.forget(&sp("never/written.py")).unwrap();
    }

    #[test]
    fn directory_at_artifact_path_is_a_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        store.remember(&sp("pkg/mod.py"), &CodeTree::from("tree")).unwrap();

        assert!(matches!(
            store.recall(&sp("pkg")),
            Err(StoreError::CodeTreeNotFound(_))
        ));
        assert!(!store.contains(&sp("pkg")).unwrap());
        store.forget(&sp("pkg")).unwrap();
        assert_eq!(store.recall(&sp("pkg/mod.py")).unwrap(), CodeTree::from("tree"));
    }

    #[test]
    fn path_through_a_stored_file_is_a_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        store.remember(&sp("mod.py"), &CodeTree::from("tree")).unwrap();

        assert!(matches!(
            store.recall(&sp("mod.py/inner.py")),
            Err(StoreError::CodeTreeNotFound(_))
        ));
        store.forget(&sp("mod.py/inner.py")).unwrap();
        assert!(store.contains(&sp("mod.py")).unwrap());
    }

    #[test]
    fn remember_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        let key = sp("module.py");
        store.remember(&key, &CodeTree::from("old")).unwrap();
        store.remember(&key, &CodeTree::from("new")).unwrap();
        assert_eq!(store.recall(&key).unwrap(), CodeTree::from("new"));
        assert_eq!(store.subpaths().unwrap(), vec![key]);
    }

    // -----------------------------------------------------------------------
    // Durability
    // -----------------------------------------------------------------------

    #[test]
    fn trees_survive_a_new_instance() {
        let tmp = tempfile::tempdir().unwrap();
        let key = sp("pkg/mod.py");
        store_in(&tmp)
            .remember(&key, &CodeTree::from("persisted"))
            .unwrap();

        let reopened = store_in(&tmp);
        assert_eq!(reopened.recall(&key).unwrap(), CodeTree::from("persisted"));
    }

    #[test]
    fn subpaths_lists_nested_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        assert!(store.subpaths().unwrap().is_empty());
        assert!(store.is_empty().unwrap());
        store.remember(&sp("b.py"), &CodeTree::from("b")).unwrap();
        store.remember(&sp("a/c.py"), &CodeTree::from("c")).unwrap();
        assert_eq!(store.subpaths().unwrap(), vec![sp("a/c.py"), sp("b.py")]);
        assert_eq!(store.len().unwrap(), 2);
    }

    // -----------------------------------------------------------------------
    // Corruption
    // -----------------------------------------------------------------------

    #[test]
    fn garbage_artifact_is_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        let key = sp("module.py");
        let path = store.artifact_path(&key);
        ensure_dir(path.parent().unwrap()).unwrap();
        fs::write(&path, b"\x01").unwrap();

        let err = store.recall(&key).unwrap_err();
        assert!(matches!(err, StoreError::CorruptTree { .. }));
        assert!(err.is_cache_miss());
    }

    #[test]
    fn tampered_payload_fails_digest_check() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        let key = sp("module.py");
        store.remember(&key, &CodeTree::from("original")).unwrap();

        let path = store.artifact_path(&key);
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&path, bytes).unwrap();

        match store.recall(&key) {
            Err(StoreError::CorruptTree { reason, .. }) => {
                assert!(reason.contains("digest mismatch"))
            }
            other => panic!("expected CorruptTree, got {other:?}"),
        }
    }

    #[test]
    fn debug_format() {
        let store = FileCodeTreeStore::new("/cache");
        assert!(format!("{store:?}").contains("FileCodeTreeStore"));
    }
}
