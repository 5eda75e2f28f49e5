//! Named runnable scripts used to observe runtime behavior.

use std::fmt;
use std::fs;
use std::io;
use std::sync::Arc;

use scope_store::ProjectLayout;

use crate::capture::{CallRecord, Recorder};
use crate::execution::ExecutionId;

/// Supplies the source text of a point of entry.
///
/// The capture protocol only ever asks for text, so any kind of entry point
/// (a file on disk, a generated snippet, a fixed string in a test) plugs in
/// here.
pub trait ContentSource: Send + Sync {
    fn content(&self, layout: &ProjectLayout, name: &str) -> io::Result<String>;

    /// Whether the content lives at `<root>/.pythoscope/points-of-entry/<name>`.
    fn is_on_disk(&self) -> bool {
        false
    }
}

/// Reads `<root>/.pythoscope/points-of-entry/<name>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct OnDisk;

impl ContentSource for OnDisk {
    fn content(&self, layout: &ProjectLayout, name: &str) -> io::Result<String> {
        fs::read_to_string(layout.point_of_entry_path(name))
    }

    fn is_on_disk(&self) -> bool {
        true
    }
}

/// Fixed source text.
#[derive(Clone, Debug, Default)]
pub struct Inline(pub String);

impl Inline {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }
}

impl ContentSource for Inline {
    fn content(&self, _layout: &ProjectLayout, _name: &str) -> io::Result<String> {
        Ok(self.0.clone())
    }
}

impl<F> ContentSource for F
where
    F: Fn() -> String + Send + Sync,
{
    fn content(&self, _layout: &ProjectLayout, _name: &str) -> io::Result<String> {
        Ok(self())
    }
}

/// A named script whose runs are captured as executions.
///
/// The point of entry holds the recorder of the run in progress. A run that
/// never finishes (the runner could not launch) leaves its partial capture
/// behind; [`clear_previous_run`](PointOfEntry::clear_previous_run) discards
/// it before the next run starts.
pub struct PointOfEntry {
    name: String,
    content: Arc<dyn ContentSource>,
    recorder: Option<Recorder>,
    last_execution: Option<ExecutionId>,
}

impl PointOfEntry {
    pub(crate) fn new(name: impl Into<String>, content: Arc<dyn ContentSource>) -> Self {
        Self {
            name: name.into(),
            content,
            recorder: None,
            last_execution: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current source text of the script.
    pub fn get_content(&self, layout: &ProjectLayout) -> io::Result<String> {
        self.content.content(layout, &self.name)
    }

    /// Replace the content source.
    pub fn set_content_source(&mut self, content: Arc<dyn ContentSource>) {
        self.content = content;
    }

    pub fn is_on_disk(&self) -> bool {
        self.content.is_on_disk()
    }

    /// The execution produced by the most recent completed run.
    pub fn last_execution(&self) -> Option<ExecutionId> {
        self.last_execution
    }

    /// Whether a run has started and not been finished or cleared.
    pub fn has_pending_capture(&self) -> bool {
        self.recorder.is_some()
    }

    /// Forget everything left over from a previous run.
    pub fn clear_previous_run(&mut self) {
        self.recorder = None;
        self.last_execution = None;
    }

    pub(crate) fn begin_run(&mut self) -> &mut Recorder {
        self.recorder.insert(Recorder::new())
    }

    pub(crate) fn finish_run(&mut self, execution: ExecutionId) -> Vec<CallRecord> {
        self.last_execution = Some(execution);
        self.recorder.take().map(Recorder::finish).unwrap_or_default()
    }
}

impl fmt::Debug for PointOfEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointOfEntry")
            .field("name", &self.name)
            .field("on_disk", &self.is_on_disk())
            .field("pending_capture", &self.has_pending_capture())
            .field("last_execution", &self.last_execution)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CapturedValue;

    #[test]
    fn inline_and_closure_content() {
        let layout = ProjectLayout::new("/nowhere");
        let fixed = PointOfEntry::new("poe", Arc::new(Inline::new("print(1)")));
        assert_eq!(fixed.get_content(&layout).unwrap(), "print(1)");
        assert!(!fixed.is_on_disk());

        let generated = PointOfEntry::new("gen", Arc::new(|| String::from("# generated")));
        assert_eq!(generated.get_content(&layout).unwrap(), "# generated");
    }

    #[test]
    fn on_disk_content() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(tmp.path());
        layout.init().unwrap();
        fs::write(layout.point_of_entry_path("poe"), "import module").unwrap();

        let poe = PointOfEntry::new("poe", Arc::new(OnDisk));
        assert!(poe.is_on_disk());
        assert_eq!(poe.get_content(&layout).unwrap(), "import module");
    }

    #[test]
    fn missing_on_disk_content_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(tmp.path());
        let poe = PointOfEntry::new("gone", Arc::new(OnDisk));
        assert!(poe.get_content(&layout).is_err());
    }

    #[test]
    fn clear_previous_run_drops_partial_capture() {
        let mut poe = PointOfEntry::new("poe", Arc::new(Inline::default()));
        poe.begin_run().enter("module", "f", vec![]);
        assert!(poe.has_pending_capture());

        poe.clear_previous_run();
        assert!(!poe.has_pending_capture());

        poe.begin_run();
        let calls = poe.finish_run(ExecutionId::new());
        assert!(calls.is_empty());
    }

    #[test]
    fn finish_run_returns_calls_and_links_execution() {
        let mut poe = PointOfEntry::new("poe", Arc::new(Inline::default()));
        let rec = poe.begin_run();
        rec.enter("module", "f", vec![]);
        rec.returned(CapturedValue::Int(1));
        let id = ExecutionId::new();
        let calls = poe.finish_run(id);
        assert_eq!(calls.len(), 1);
        assert_eq!(poe.last_execution(), Some(id));
        assert!(!poe.has_pending_capture());
    }
}
