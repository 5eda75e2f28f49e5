//! Code-tree storage for Scope.
//!
//! This crate caches one parsed [`CodeTree`](scope_types::CodeTree) per module
//! subpath. It is a pure key-value cache: it never looks at source files and
//! has no notion of freshness. Deciding whether a cached tree is still valid is
//! the job of the project layer.
//!
//! # Storage Backends
//!
//! All backends implement the [`CodeTreeStore`] trait:
//!
//! - [`FileCodeTreeStore`] -- one artifact per module under
//!   `<root>/.pythoscope/code-trees/`, mirroring the module's subpath
//! - [`InMemoryCodeTreeStore`] -- `HashMap`-based store for tests and
//!   ephemeral runs
//!
//! [`open_store`] picks one according to a [`StoreBackend`] setting.
//!
//! # Design Rules
//!
//! 1. At most one tree per subpath; `remember` overwrites.
//! 2. `recall` of an absent key fails with `CodeTreeNotFound`, never a default.
//! 3. `forget` is idempotent.
//! 4. A durable artifact that fails its digest check is reported as corrupt,
//!    never returned.
//! 5. Creating a directory that already exists is not an error; every other
//!    I/O failure propagates.

pub mod backend;
pub mod error;
pub mod file;
pub mod layout;
pub mod memory;
pub mod traits;

pub use backend::{open_store, StoreBackend};
pub use error::{StoreError, StoreResult};
pub use file::FileCodeTreeStore;
pub use layout::{ensure_dir, ProjectLayout};
pub use memory::InMemoryCodeTreeStore;
pub use traits::CodeTreeStore;
