//! A tracked source module.

use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use scope_types::{Class, CodeTree, Definition, Function, Subpath};

/// One source file of the project.
///
/// The code tree is held only in memory and loaded lazily through the
/// project's code-tree store. `tree_mtime` records the modification time of
/// the source the current tree was built from; a tree is trusted only while
/// the source on disk is not newer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Module {
    subpath: Subpath,
    #[serde(default)]
    objects: Vec<Definition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tree_mtime: Option<SystemTime>,
    #[serde(skip)]
    code_tree: Option<CodeTree>,
}

impl Module {
    pub(crate) fn new(subpath: Subpath) -> Self {
        Self {
            subpath,
            objects: Vec::new(),
            tree_mtime: None,
            code_tree: None,
        }
    }

    pub fn subpath(&self) -> &Subpath {
        &self.subpath
    }

    /// Dotted import name, e.g. `pkg.mod`.
    pub fn locator(&self) -> String {
        self.subpath.locator()
    }

    /// Whether `name` refers to this module, either as a locator or as a
    /// subpath.
    pub fn is_named(&self, name: &str) -> bool {
        name == self.subpath.as_str() || name == self.locator()
    }

    /// Declared callables in declaration order.
    pub fn objects(&self) -> &[Definition] {
        &self.objects
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.objects.iter().filter_map(Definition::as_function)
    }

    pub fn classes(&self) -> impl Iterator<Item = &Class> {
        self.objects.iter().filter_map(Definition::as_class)
    }

    pub fn object(&self, name: &str) -> Option<&Definition> {
        self.objects.iter().find(|o| o.name() == name)
    }

    /// Declare a callable. A previous declaration with the same name is
    /// replaced in place.
    pub fn add_object(&mut self, object: impl Into<Definition>) {
        let object = object.into();
        match self.objects.iter_mut().find(|o| o.name() == object.name()) {
            Some(existing) => *existing = object,
            None => self.objects.push(object),
        }
    }

    /// The code tree, if one has been loaded in this process.
    pub fn code_tree(&self) -> Option<&CodeTree> {
        self.code_tree.as_ref()
    }

    /// Modification time of the source the cached tree was built from.
    pub fn tree_mtime(&self) -> Option<SystemTime> {
        self.tree_mtime
    }

    /// Whether a tree built at `tree_mtime` still matches a source last
    /// modified at `source_mtime`.
    pub fn tree_is_current(&self, source_mtime: SystemTime) -> bool {
        self.tree_mtime.is_some_and(|built| built >= source_mtime)
    }

    /// Read the module's source text from under `root`.
    pub fn read_source(&self, root: &Path) -> io::Result<String> {
        fs::read_to_string(self.subpath.to_path(root))
    }

    /// Take the in-memory tree if it still matches the source.
    ///
    /// A stale tree is dropped together with its stamp, so it stays gone even
    /// if building a new one fails.
    pub(crate) fn take_fresh_tree(&mut self, source_mtime: SystemTime) -> Option<CodeTree> {
        if self.tree_is_current(source_mtime) {
            self.code_tree.take()
        } else {
            self.invalidate();
            None
        }
    }

    pub(crate) fn attach_tree(&mut self, tree: CodeTree, source_mtime: SystemTime) -> &CodeTree {
        self.tree_mtime = Some(source_mtime);
        self.code_tree.insert(tree)
    }

    pub(crate) fn replace_objects(&mut self, objects: Vec<Definition>) {
        self.objects = objects;
    }

    /// Drop the in-memory tree and its freshness stamp.
    pub(crate) fn invalidate(&mut self) {
        self.code_tree = None;
        self.tree_mtime = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn module(path: &str) -> Module {
        Module::new(Subpath::parse(path).unwrap())
    }

    #[test]
    fn naming() {
        let m = module("pkg/mod.py");
        assert_eq!(m.locator(), "pkg.mod");
        assert!(m.is_named("pkg.mod"));
        assert!(m.is_named("pkg/mod.py"));
        assert!(!m.is_named("mod"));
    }

    #[test]
    fn add_object_replaces_same_name() {
        let mut m = module("module.py");
        m.add_object(Function::new("function"));
        m.add_object(Class::new("Widget"));
        m.add_object(Function::new("function").with_args(["x"]));
        assert_eq!(m.objects().len(), 2);
        assert_eq!(m.functions().next().unwrap().args, vec!["x".to_string()]);
        assert_eq!(m.classes().count(), 1);
        assert!(m.object("Widget").is_some());
    }

    #[test]
    fn freshness_follows_mtime() {
        let mut m = module("module.py");
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let later = t0 + Duration::from_secs(1);

        assert!(!m.tree_is_current(t0));
        m.attach_tree(CodeTree::from("tree"), t0);
        assert!(m.tree_is_current(t0));
        assert!(!m.tree_is_current(later));

        assert_eq!(m.take_fresh_tree(t0), Some(CodeTree::from("tree")));
        assert!(m.code_tree().is_none());
    }

    #[test]
    fn stale_tree_is_dropped() {
        let mut m = module("module.py");
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        m.attach_tree(CodeTree::from("tree"), t0);

        assert!(m.take_fresh_tree(t0 + Duration::from_secs(1)).is_none());
        assert!(m.code_tree().is_none());
        assert!(m.tree_mtime().is_none());
    }

    #[test]
    fn invalidate_forgets_stamp() {
        let mut m = module("module.py");
        let t0 = SystemTime::UNIX_EPOCH;
        m.attach_tree(CodeTree::from("tree"), t0);
        m.invalidate();
        assert!(m.code_tree().is_none());
        assert!(m.tree_mtime().is_none());
    }

    #[test]
    fn serde_skips_tree() {
        let mut m = module("module.py");
        m.add_object(Function::new("f"));
        m.attach_tree(CodeTree::from("tree"), SystemTime::UNIX_EPOCH);
        let json = serde_json::to_string(&m).unwrap();
        let back: Module = serde_json::from_str(&json).unwrap();
        assert_eq!(back.subpath(), m.subpath());
        assert_eq!(back.objects(), m.objects());
        assert_eq!(back.tree_mtime(), m.tree_mtime());
        assert!(back.code_tree().is_none());
    }
}
