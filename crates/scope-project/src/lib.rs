//! # scope-project
//!
//! The project registry behind test generation. A [`Project`] tracks the
//! source modules of a code base, the callables each one declares, the
//! points of entry used to exercise them, and the executions captured while
//! those scripts ran. [`Project::iter_test_cases`] joins the static and
//! runtime views into one [`TestCase`] per declared callable.
//!
//! Parsing and running are collaborators supplied by the caller through the
//! [`Parser`] and [`Runner`] traits; code trees are cached through a
//! [`scope_store::CodeTreeStore`].
//!
//! ```no_run
//! use scope_project::{Project, ProjectConfig};
//! use scope_types::Function;
//!
//! # fn main() -> scope_project::ProjectResult<()> {
//! let mut project = Project::new("/path/to/project", ProjectConfig::default())?;
//! project.create_module("module.py")?.add_object(Function::new("function"));
//! for case in project.iter_test_cases() {
//!     println!("{} -> {}", case.module().locator(), case.test_name());
//! }
//! project.save()?;
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod config;
pub mod error;
pub mod execution;
pub mod logging;
pub mod module;
pub mod parser;
pub mod point_of_entry;
pub mod project;
pub mod runner;
pub mod test_case;

pub use capture::{arg, capture, CallOutcome, CallRecord, CapturedValue, Recorder};
pub use config::{ProjectConfig, DEFAULT_TESTS_DIRECTORY};
pub use error::{ProjectError, ProjectResult};
pub use execution::{Execution, ExecutionId, ExecutionOutcome};
pub use module::Module;
pub use parser::{ParseError, Parsed, Parser};
pub use point_of_entry::{ContentSource, Inline, OnDisk, PointOfEntry};
pub use project::Project;
pub use runner::{RunError, Runner};
pub use test_case::{ObservedCall, TestCase};
