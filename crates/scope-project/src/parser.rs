//! The parser collaborator.
//!
//! Turning source text into a code tree happens outside this crate. The
//! registry only needs the opaque tree and the callables it declares.

use scope_types::{CodeTree, Definition};

/// Output of one parse.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parsed {
    pub tree: CodeTree,
    /// Callables declared by the module, in source order.
    pub objects: Vec<Definition>,
}

impl Parsed {
    pub fn new(tree: CodeTree) -> Self {
        Self {
            tree,
            objects: Vec::new(),
        }
    }

    pub fn with_object(mut self, object: impl Into<Definition>) -> Self {
        self.objects.push(object.into());
        self
    }
}

/// The parser refused the source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ParseError(pub String);

/// Source-to-code-tree parser.
pub trait Parser {
    fn parse(&self, source: &str) -> Result<Parsed, ParseError>;
}

impl<F> Parser for F
where
    F: Fn(&str) -> Result<Parsed, ParseError>,
{
    fn parse(&self, source: &str) -> Result<Parsed, ParseError> {
        self(source)
    }
}
