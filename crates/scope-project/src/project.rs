//! The project registry.
//!
//! A [`Project`] owns every [`Module`], [`PointOfEntry`] and [`Execution`] it
//! creates. Modules are kept in registration order next to a
//! `Subpath -> position` index, so iteration is deterministic and lookups are
//! constant time.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};
use walkdir::WalkDir;

use scope_store::{ensure_dir, open_store, CodeTreeStore, ProjectLayout};
use scope_types::{CodeTree, Subpath, TypeError};

use crate::config::ProjectConfig;
use crate::error::{ProjectError, ProjectResult};
use crate::execution::{Execution, ExecutionId, ExecutionOutcome};
use crate::module::Module;
use crate::parser::Parser;
use crate::point_of_entry::{ContentSource, OnDisk, PointOfEntry};
use crate::runner::{RunError, Runner};
use crate::test_case::TestCase;

/// Version of the saved project file.
const PROJECT_FORMAT_VERSION: u32 = 1;

/// Registry state written to `<root>/.pythoscope/project.json`.
///
/// Code trees are not part of it; they live in the code-tree store.
#[derive(Deserialize)]
struct SavedProject {
    format_version: u32,
    modules: Vec<Module>,
    points_of_entry: Vec<String>,
    executions: Vec<Execution>,
}

/// Borrowed form of [`SavedProject`] used when writing.
#[derive(Serialize)]
struct SavedProjectRef<'a> {
    format_version: u32,
    modules: &'a [Module],
    points_of_entry: Vec<&'a str>,
    executions: &'a [Execution],
}

/// Top-level registry of a source project.
pub struct Project {
    layout: ProjectLayout,
    config: ProjectConfig,
    store: Box<dyn CodeTreeStore>,
    modules: Vec<Module>,
    module_index: HashMap<Subpath, usize>,
    points_of_entry: BTreeMap<String, PointOfEntry>,
    executions: Vec<Execution>,
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("path", &self.layout.root())
            .field("modules", &self.modules.len())
            .field("points_of_entry", &self.points_of_entry.len())
            .field("executions", &self.executions.len())
            .finish()
    }
}

impl Project {
    // ---------------------------------------------------------------
    // Construction and persistence
    // ---------------------------------------------------------------

    /// Create an empty project rooted at `root`.
    ///
    /// The root must exist; it is canonicalized. The code-tree store is the
    /// one selected by `config`. Nothing is written to disk.
    pub fn new(root: impl AsRef<Path>, config: ProjectConfig) -> ProjectResult<Self> {
        let root = fs::canonicalize(root.as_ref())?;
        let layout = ProjectLayout::new(root);
        let store = open_store(config.store_backend, &layout);
        Ok(Self::assemble(layout, config, store))
    }

    /// Create an empty project with an explicitly provided store.
    pub fn with_store(
        root: impl AsRef<Path>,
        config: ProjectConfig,
        store: Box<dyn CodeTreeStore>,
    ) -> ProjectResult<Self> {
        let root = fs::canonicalize(root.as_ref())?;
        Ok(Self::assemble(ProjectLayout::new(root), config, store))
    }

    fn assemble(layout: ProjectLayout, config: ProjectConfig, store: Box<dyn CodeTreeStore>) -> Self {
        Self {
            layout,
            config,
            store,
            modules: Vec::new(),
            module_index: HashMap::new(),
            points_of_entry: BTreeMap::new(),
            executions: Vec::new(),
        }
    }

    /// Open the project at `root` using its `config.toml` (or defaults) and
    /// any previously saved registry.
    pub fn open(root: impl AsRef<Path>) -> ProjectResult<Self> {
        let root = fs::canonicalize(root.as_ref())?;
        let config = ProjectConfig::load(&ProjectLayout::new(&root))?;
        Self::open_with(root, config)
    }

    /// Open the project at `root` with explicit settings.
    pub fn open_with(root: impl AsRef<Path>, config: ProjectConfig) -> ProjectResult<Self> {
        let mut project = Self::new(root, config)?;
        let saved = match fs::read_to_string(project.layout.project_file()) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(root = %project.path().display(), "no saved project; starting empty");
                return Ok(project);
            }
            Err(e) => return Err(ProjectError::Io(e)),
        };
        let saved: SavedProject =
            serde_json::from_str(&saved).map_err(|e| ProjectError::Serialization(e.to_string()))?;
        if saved.format_version != PROJECT_FORMAT_VERSION {
            return Err(ProjectError::Serialization(format!(
                "unsupported project format version {}",
                saved.format_version
            )));
        }

        for module in saved.modules {
            project.register(module)?;
        }
        for name in saved.points_of_entry {
            project
                .points_of_entry
                .insert(name.clone(), PointOfEntry::new(name, Arc::new(OnDisk)));
        }
        project.executions = saved.executions;

        info!(
            root = %project.path().display(),
            modules = project.modules.len(),
            executions = project.executions.len(),
            "project loaded"
        );
        Ok(project)
    }

    /// Write the registry to `<root>/.pythoscope/project.json`.
    ///
    /// Only points of entry backed by files in the points-of-entry directory
    /// are recorded; injected content sources are runtime-only.
    pub fn save(&self) -> ProjectResult<()> {
        ensure_dir(&self.layout.state_dir())?;
        let saved = SavedProjectRef {
            format_version: PROJECT_FORMAT_VERSION,
            modules: &self.modules,
            points_of_entry: self
                .points_of_entry
                .values()
                .filter(|poe| poe.is_on_disk())
                .map(PointOfEntry::name)
                .collect(),
            executions: &self.executions,
        };
        let json = serde_json::to_string_pretty(&saved)
            .map_err(|e| ProjectError::Serialization(e.to_string()))?;

        let target = self.layout.project_file();
        let staging = target.with_extension("json.tmp");
        fs::write(&staging, json)?;
        fs::rename(&staging, &target)?;
        debug!(path = %target.display(), "project saved");
        Ok(())
    }

    // ---------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------

    /// Canonical project root.
    pub fn path(&self) -> &Path {
        self.layout.root()
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn new_tests_directory(&self) -> &str {
        &self.config.new_tests_directory
    }

    pub fn set_new_tests_directory(&mut self, dir: impl Into<String>) {
        self.config.new_tests_directory = dir.into();
    }

    pub fn store(&self) -> &dyn CodeTreeStore {
        self.store.as_ref()
    }

    // ---------------------------------------------------------------
    // Module registry
    // ---------------------------------------------------------------

    /// Turn a path into the subpath it registers under.
    ///
    /// Relative paths are taken relative to the root and may use `/` or `\`.
    /// Absolute paths must lie under the root; a path that reaches the root
    /// through a symlink is canonicalized first.
    pub fn resolve(&self, path: impl AsRef<Path>) -> ProjectResult<Subpath> {
        let path = path.as_ref();
        match Subpath::from_path(self.path(), path) {
            Err(TypeError::OutsideProject { .. }) if path.exists() => {
                let canonical = fs::canonicalize(path)?;
                Ok(Subpath::from_path(self.path(), &canonical)?)
            }
            other => Ok(other?),
        }
    }

    /// Register a new module for `path`.
    ///
    /// Fails with [`ProjectError::ModuleAlreadyExists`] if the path resolves to
    /// a subpath that is already registered; use
    /// [`ensure_module`](Project::ensure_module) for get-or-create.
    pub fn create_module(&mut self, path: impl AsRef<Path>) -> ProjectResult<&mut Module> {
        let subpath = self.resolve(path)?;
        let idx = self.register(Module::new(subpath))?;
        Ok(&mut self.modules[idx])
    }

    /// Return the module for `path`, registering it first if needed.
    pub fn ensure_module(&mut self, path: impl AsRef<Path>) -> ProjectResult<&mut Module> {
        let subpath = self.resolve(path)?;
        let idx = match self.module_index.get(&subpath) {
            Some(&idx) => idx,
            None => self.register(Module::new(subpath))?,
        };
        Ok(&mut self.modules[idx])
    }

    fn register(&mut self, module: Module) -> ProjectResult<usize> {
        let subpath = module.subpath().clone();
        if self.module_index.contains_key(&subpath) {
            return Err(ProjectError::ModuleAlreadyExists(subpath));
        }
        let idx = self.modules.len();
        self.modules.push(module);
        debug!(subpath = %subpath, "module registered");
        self.module_index.insert(subpath, idx);
        Ok(idx)
    }

    /// Position of the module a path or dotted locator refers to.
    fn find(&self, key: &Path) -> ProjectResult<usize> {
        if let Ok(subpath) = self.resolve(key) {
            if let Some(&idx) = self.module_index.get(&subpath) {
                return Ok(idx);
            }
        }
        let key_str = key.to_string_lossy();
        self.modules
            .iter()
            .position(|m| m.locator() == key_str)
            .ok_or_else(|| ProjectError::ModuleNotFound(key_str.into_owned()))
    }

    /// Look up a module by path (`pkg/mod.py`) or locator (`pkg.mod`).
    pub fn module(&self, key: impl AsRef<Path>) -> ProjectResult<&Module> {
        let idx = self.find(key.as_ref())?;
        Ok(&self.modules[idx])
    }

    pub fn module_mut(&mut self, key: impl AsRef<Path>) -> ProjectResult<&mut Module> {
        let idx = self.find(key.as_ref())?;
        Ok(&mut self.modules[idx])
    }

    pub fn contains_module(&self, key: impl AsRef<Path>) -> bool {
        self.find(key.as_ref()).is_ok()
    }

    /// Modules in registration order.
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Unregister a module and forget its cached tree.
    pub fn remove_module(&mut self, key: impl AsRef<Path>) -> ProjectResult<Module> {
        let idx = self.find(key.as_ref())?;
        self.store.forget(self.modules[idx].subpath())?;
        let module = self.modules.remove(idx);
        self.reindex();
        debug!(subpath = %module.subpath(), "module removed");
        Ok(module)
    }

    /// Remove modules whose source file no longer exists.
    ///
    /// Returns the removed subpaths in registration order.
    pub fn prune_deleted_modules(&mut self) -> ProjectResult<Vec<Subpath>> {
        let root = self.layout.root().to_path_buf();
        let (kept, removed): (Vec<Module>, Vec<Module>) = std::mem::take(&mut self.modules)
            .into_iter()
            .partition(|m| m.subpath().to_path(&root).is_file());
        self.modules = kept;
        self.reindex();

        let mut subpaths = Vec::with_capacity(removed.len());
        for module in removed {
            self.store.forget(module.subpath())?;
            info!(subpath = %module.subpath(), "source deleted; module removed");
            subpaths.push(module.subpath().clone());
        }
        Ok(subpaths)
    }

    fn reindex(&mut self) {
        self.module_index = self
            .modules
            .iter()
            .enumerate()
            .map(|(idx, m)| (m.subpath().clone(), idx))
            .collect();
    }

    /// Where the generated test module for `module` goes:
    /// `<new_tests_directory>/test_<locator>.py`, with dots in the locator
    /// replaced by underscores.
    pub fn test_module_path(&self, module: &Module) -> ProjectResult<Subpath> {
        let dir = Subpath::parse(&self.config.new_tests_directory)?;
        let file = format!("test_{}.py", module.locator().replace('.', "_"));
        Ok(dir.join(&file)?)
    }

    /// Current source text of a registered module.
    pub fn module_source(&self, key: impl AsRef<Path>) -> ProjectResult<String> {
        let module = self.module(key)?;
        Ok(module.read_source(self.path())?)
    }

    // ---------------------------------------------------------------
    // Code trees
    // ---------------------------------------------------------------

    /// The module's code tree, loaded lazily.
    ///
    /// A tree is reused only if it was built from a source that is not older
    /// than the file on disk. Otherwise the store is consulted, and when it
    /// has nothing usable the source is parsed and the result remembered.
    pub fn code_tree(&mut self, key: impl AsRef<Path>, parser: &dyn Parser) -> ProjectResult<&CodeTree> {
        let idx = self.find(key.as_ref())?;
        let mtime = self.source_mtime(idx)?;

        let tree = match self.modules[idx].take_fresh_tree(mtime) {
            Some(tree) => tree,
            None => self.load_tree(idx, mtime, parser)?,
        };
        Ok(self.modules[idx].attach_tree(tree, mtime))
    }

    /// Parse the module again regardless of any cached tree.
    pub fn refresh_module(&mut self, key: impl AsRef<Path>, parser: &dyn Parser) -> ProjectResult<&CodeTree> {
        let idx = self.find(key.as_ref())?;
        let mtime = self.source_mtime(idx)?;
        self.modules[idx].invalidate();
        let tree = self.parse_module(idx, parser)?;
        Ok(self.modules[idx].attach_tree(tree, mtime))
    }

    fn source_mtime(&self, idx: usize) -> ProjectResult<SystemTime> {
        let path = self.modules[idx].subpath().to_path(self.path());
        Ok(fs::metadata(path)?.modified()?)
    }

    fn load_tree(&mut self, idx: usize, mtime: SystemTime, parser: &dyn Parser) -> ProjectResult<CodeTree> {
        let module = &self.modules[idx];
        if module.tree_is_current(mtime) {
            match self.store.recall(module.subpath()) {
                Ok(tree) => {
                    debug!(subpath = %module.subpath(), "code tree recalled");
                    return Ok(tree);
                }
                Err(e) if e.is_cache_miss() => {
                    debug!(subpath = %module.subpath(), reason = %e, "cached code tree unusable");
                }
                Err(e) => return Err(e.into()),
            }
        }
        self.parse_module(idx, parser)
    }

    fn parse_module(&mut self, idx: usize, parser: &dyn Parser) -> ProjectResult<CodeTree> {
        let module = &mut self.modules[idx];
        let subpath = module.subpath().clone();
        let source = module.read_source(self.layout.root())?;
        let parsed = parser.parse(&source).map_err(|e| ProjectError::Parse {
            subpath: subpath.clone(),
            reason: e.to_string(),
        })?;
        self.store.remember(&subpath, &parsed.tree)?;
        info!(
            subpath = %subpath,
            objects = parsed.objects.len(),
            digest = %parsed.tree.digest().short_hex(),
            "module parsed"
        );
        module.replace_objects(parsed.objects);
        Ok(parsed.tree)
    }

    // ---------------------------------------------------------------
    // Points of entry
    // ---------------------------------------------------------------

    /// Register a point of entry with the given content source.
    pub fn add_point_of_entry(
        &mut self,
        name: impl Into<String>,
        content: impl ContentSource + 'static,
    ) -> ProjectResult<&mut PointOfEntry> {
        let name = name.into();
        validate_point_of_entry_name(&name)?;
        if self.points_of_entry.contains_key(&name) {
            return Err(ProjectError::PointOfEntryAlreadyExists(name));
        }
        debug!(name = %name, "point of entry added");
        Ok(self
            .points_of_entry
            .entry(name.clone())
            .or_insert_with(|| PointOfEntry::new(name, Arc::new(content))))
    }

    /// Write `source` to the points-of-entry directory and register it as an
    /// on-disk point of entry if it is not registered yet.
    pub fn write_point_of_entry(&mut self, name: &str, source: &str) -> ProjectResult<&mut PointOfEntry> {
        validate_point_of_entry_name(name)?;
        ensure_dir(&self.layout.points_of_entry_dir())?;
        fs::write(self.layout.point_of_entry_path(name), source)?;
        Ok(self
            .points_of_entry
            .entry(name.to_string())
            .or_insert_with(|| PointOfEntry::new(name, Arc::new(OnDisk))))
    }

    pub fn point_of_entry(&self, name: &str) -> ProjectResult<&PointOfEntry> {
        self.points_of_entry
            .get(name)
            .ok_or_else(|| ProjectError::PointOfEntryNotFound(name.to_string()))
    }

    pub fn point_of_entry_mut(&mut self, name: &str) -> ProjectResult<&mut PointOfEntry> {
        self.points_of_entry
            .get_mut(name)
            .ok_or_else(|| ProjectError::PointOfEntryNotFound(name.to_string()))
    }

    /// Points of entry sorted by name.
    pub fn points_of_entry(&self) -> impl Iterator<Item = &PointOfEntry> {
        self.points_of_entry.values()
    }

    /// Unregister a point of entry and drop its executions.
    pub fn remove_point_of_entry(&mut self, name: &str) -> ProjectResult<PointOfEntry> {
        let poe = self
            .points_of_entry
            .remove(name)
            .ok_or_else(|| ProjectError::PointOfEntryNotFound(name.to_string()))?;
        self.executions.retain(|e| e.point_of_entry() != name);
        Ok(poe)
    }

    /// Sync on-disk points of entry with the points-of-entry directory.
    ///
    /// New files are registered; on-disk entries whose file disappeared are
    /// removed together with their executions. Returns the names added.
    pub fn discover_points_of_entry(&mut self) -> ProjectResult<Vec<String>> {
        let dir = self.layout.points_of_entry_dir();
        let found = list_point_of_entry_files(&dir)?;

        let vanished: Vec<String> = self
            .points_of_entry
            .values()
            .filter(|poe| poe.is_on_disk() && !found.iter().any(|n| n == poe.name()))
            .map(|poe| poe.name().to_string())
            .collect();
        for name in vanished {
            info!(name = %name, "point of entry file removed; dropping");
            self.remove_point_of_entry(&name)?;
        }

        let mut added = Vec::new();
        for name in found {
            if !self.points_of_entry.contains_key(&name) {
                self.points_of_entry
                    .insert(name.clone(), PointOfEntry::new(name.clone(), Arc::new(OnDisk)));
                added.push(name);
            }
        }
        if !added.is_empty() {
            info!(count = added.len(), "points of entry discovered");
        }
        Ok(added)
    }

    // ---------------------------------------------------------------
    // Executions
    // ---------------------------------------------------------------

    /// Run a point of entry once and record the resulting execution.
    ///
    /// Leftovers from any previous run of the same point of entry are cleared
    /// first. A script that raises still yields an execution; a script that
    /// cannot be launched yields [`ProjectError::Run`] and no execution.
    pub fn run_point_of_entry(&mut self, name: &str, runner: &dyn Runner) -> ProjectResult<&Execution> {
        let poe = self
            .points_of_entry
            .get_mut(name)
            .ok_or_else(|| ProjectError::PointOfEntryNotFound(name.to_string()))?;
        let source = poe.get_content(&self.layout)?;
        poe.clear_previous_run();

        let span = info_span!("execution", point_of_entry = %name);
        let _guard = span.enter();

        let started_at = Utc::now();
        let outcome = match runner.run(&source, poe.begin_run()) {
            Ok(()) => ExecutionOutcome::Completed,
            Err(RunError::Raised { type_name, message }) => {
                info!(%type_name, %message, "script raised; keeping captured calls");
                ExecutionOutcome::Raised { type_name, message }
            }
            Err(RunError::Launch(reason)) => {
                warn!(%reason, "point of entry could not be run");
                return Err(ProjectError::Run {
                    name: name.to_string(),
                    reason,
                });
            }
        };

        let id = ExecutionId::new();
        let calls = poe.finish_run(id);
        let execution = Execution::new(id, name, started_at, calls, outcome);
        info!(id = %execution.id().short_id(), calls = execution.calls().len(), "execution captured");

        self.executions.push(execution);
        Ok(&self.executions[self.executions.len() - 1])
    }

    /// All executions in the order they were captured.
    pub fn executions(&self) -> &[Execution] {
        &self.executions
    }

    pub fn execution(&self, id: ExecutionId) -> Option<&Execution> {
        self.executions.iter().find(|e| e.id() == id)
    }

    /// Executions produced by one point of entry, oldest first.
    pub fn executions_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Execution> + 'a {
        self.executions
            .iter()
            .filter(move |e| e.point_of_entry() == name)
    }

    // ---------------------------------------------------------------
    // Test cases
    // ---------------------------------------------------------------

    /// Test cases for every declared callable, joined with the calls captured
    /// for it.
    ///
    /// Ordered by module registration, then declaration order. Modules under
    /// the new-tests directory are skipped. Each call returns a fresh lazy
    /// iterator over the current state.
    pub fn iter_test_cases(&self) -> impl Iterator<Item = TestCase<'_>> + '_ {
        let tests_dir = Subpath::parse(&self.config.new_tests_directory).ok();
        self.modules
            .iter()
            .filter(move |m| {
                !tests_dir
                    .as_ref()
                    .is_some_and(|dir| m.subpath().starts_with_dir(dir))
            })
            .flat_map(move |module| {
                module
                    .objects()
                    .iter()
                    .map(move |definition| TestCase::collect(module, definition, &self.executions))
            })
    }
}

fn validate_point_of_entry_name(name: &str) -> ProjectResult<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.starts_with(".tmp");
    if invalid {
        return Err(ProjectError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// File names directly inside the points-of-entry directory, sorted.
fn list_point_of_entry_files(dir: &Path) -> ProjectResult<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            ProjectError::Io(
                e.into_io_error()
                    .unwrap_or_else(|| io::Error::other("filesystem loop in points-of-entry")),
            )
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        match entry.file_name().to_str() {
            Some(name) if validate_point_of_entry_name(name).is_ok() => names.push(name.to_string()),
            _ => warn!(path = %entry.path().display(), "skipping unusable point of entry file"),
        }
    }
    Ok(names)
}
