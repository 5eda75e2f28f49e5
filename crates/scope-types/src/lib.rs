//! Foundation types for Scope.
//!
//! This crate provides the identity and value types shared by the code-tree
//! store and the project registry. Every other Scope crate depends on
//! `scope-types`.
//!
//! # Key Types
//!
//! - [`Subpath`]: A module location relative to the project root, always
//!   spelled with `/` regardless of the host separator
//! - [`CodeTree`]: Opaque parser output cached per module
//! - [`TreeDigest`]: Domain-separated BLAKE3 digest of a code tree payload
//! - [`Definition`]: A declared callable: [`Function`] or [`Class`]

pub mod definition;
pub mod error;
pub mod subpath;
pub mod tree;

pub use definition::{Class, Definition, Function};
pub use error::TypeError;
pub use subpath::{Subpath, SEPARATOR};
pub use tree::{CodeTree, TreeDigest};
