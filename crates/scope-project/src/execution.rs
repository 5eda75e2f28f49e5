use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use scope_types::Definition;

use crate::capture::CallRecord;
use crate::module::Module;

/// Unique identifier for an execution (UUID v7 for time-ordering).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExecutionId(uuid::Uuid);

impl ExecutionId {
    /// Generate a new time-ordered execution ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// Short representation (first 8 characters of UUID).
    pub fn short_id(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExecutionId({})", self.short_id())
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a run ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Completed,
    /// The script raised at top level; calls captured before that are kept.
    Raised { type_name: String, message: String },
}

/// Captured result of running one point of entry once.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    id: ExecutionId,
    point_of_entry: String,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    calls: Vec<CallRecord>,
    outcome: ExecutionOutcome,
}

impl Execution {
    pub(crate) fn new(
        id: ExecutionId,
        point_of_entry: impl Into<String>,
        started_at: DateTime<Utc>,
        calls: Vec<CallRecord>,
        outcome: ExecutionOutcome,
    ) -> Self {
        Self {
            id,
            point_of_entry: point_of_entry.into(),
            started_at,
            finished_at: Utc::now(),
            calls,
            outcome,
        }
    }

    pub fn id(&self) -> ExecutionId {
        self.id
    }

    /// Name of the point of entry that produced this execution.
    pub fn point_of_entry(&self) -> &str {
        &self.point_of_entry
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn outcome(&self) -> &ExecutionOutcome {
        &self.outcome
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == ExecutionOutcome::Completed
    }

    /// Every captured call in run order.
    pub fn calls(&self) -> &[CallRecord] {
        &self.calls
    }

    pub fn call(&self, seq: usize) -> Option<&CallRecord> {
        self.calls.get(seq)
    }

    /// Calls made directly by the script, not from inside another captured
    /// call.
    pub fn root_calls(&self) -> impl Iterator<Item = &CallRecord> {
        self.calls.iter().filter(|c| c.parent.is_none())
    }

    /// Calls made from inside the call `seq`.
    pub fn children(&self, seq: usize) -> impl Iterator<Item = &CallRecord> {
        self.calls.iter().filter(move |c| c.parent == Some(seq))
    }

    /// Calls that target `definition` inside `module`.
    pub fn calls_to<'a>(
        &'a self,
        module: &'a Module,
        definition: &'a Definition,
    ) -> impl Iterator<Item = &'a CallRecord> + 'a {
        self.calls
            .iter()
            .filter(move |c| module.is_named(&c.module) && definition.matches_callable(&c.callable))
    }
}
