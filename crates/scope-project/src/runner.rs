//! The interpreter collaborator that runs points of entry.

use crate::capture::Recorder;

/// Why a run did not complete normally.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    /// The script started and raised. What was captured up to that point is
    /// kept.
    #[error("script raised {type_name}: {message}")]
    Raised { type_name: String, message: String },

    /// The script could not be started at all.
    #[error("could not launch script: {0}")]
    Launch(String),
}

/// Executes a point-of-entry script and reports calls to a [`Recorder`].
pub trait Runner {
    fn run(&self, source: &str, recorder: &mut Recorder) -> Result<(), RunError>;
}

impl<F> Runner for F
where
    F: Fn(&str, &mut Recorder) -> Result<(), RunError>,
{
    fn run(&self, source: &str, recorder: &mut Recorder) -> Result<(), RunError> {
        self(source, recorder)
    }
}
