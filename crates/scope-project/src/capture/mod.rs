//! Runtime capture: values and the call graph observed while a point of
//! entry runs.
//!
//! Capture never fails because of a value. Anything that cannot be turned
//! into a [`CapturedValue`] is recorded as
//! [`CapturedValue::Unrepresentable`] tagged with its type name.

mod serializer;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use self::serializer::ValueSerializer;

/// A value observed at runtime, detached from the running program.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CapturedValue {
    None,
    Bool(bool),
    Int(i64),
    Float(#[serde(with = "float_repr")] f64),
    Str(String),
    Seq(Vec<CapturedValue>),
    Map(Vec<(String, CapturedValue)>),
    /// An instance of a user type, described by its fields.
    Object {
        type_name: String,
        fields: Vec<(String, CapturedValue)>,
    },
    /// Placeholder for a value that could not be captured.
    Unrepresentable { type_name: String },
}

impl CapturedValue {
    /// Describe an object instance.
    pub fn object<I, S>(type_name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = (S, CapturedValue)>,
        S: Into<String>,
    {
        Self::Object {
            type_name: type_name.into(),
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn unrepresentable(type_name: impl Into<String>) -> Self {
        Self::Unrepresentable {
            type_name: type_name.into(),
        }
    }

    pub fn is_unrepresentable(&self) -> bool {
        matches!(self, Self::Unrepresentable { .. })
    }

    /// Convert a JSON value. Integers outside `i64` become floats.
    pub fn from_json(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::None,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Self::Str(s),
            Value::Array(items) => Self::Seq(items.into_iter().map(Self::from_json).collect()),
            Value::Object(map) => Self::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
        }
    }
}

/// Serde form of captured floats.
///
/// Finite values are plain numbers. Infinities and NaN, which JSON cannot
/// hold, are written as the strings `"inf"`, `"-inf"` and `"nan"`.
mod float_repr {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("nan")
        } else if value.is_sign_positive() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(f64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(n),
            Repr::Text(text) => match text.as_str() {
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                "nan" => Ok(f64::NAN),
                other => Err(D::Error::custom(format!("invalid float {other:?}"))),
            },
        }
    }
}

/// Capture any serializable value.
///
/// Values whose serialization fails (non-string map keys, handles that refuse
/// to serialize) become [`CapturedValue::Unrepresentable`]. Floats are kept
/// as they are, infinities and NaN included.
pub fn capture<T: Serialize + ?Sized>(value: &T) -> CapturedValue {
    match value.serialize(ValueSerializer) {
        Ok(captured) => captured,
        Err(e) => {
            let type_name = short_type_name(std::any::type_name::<T>());
            debug!(%type_name, error = %e, "value replaced by unrepresentable marker");
            CapturedValue::unrepresentable(type_name)
        }
    }
}

/// Capture a named argument.
pub fn arg<T: Serialize + ?Sized>(name: impl Into<String>, value: &T) -> (String, CapturedValue) {
    (name.into(), capture(value))
}

/// Strip the module path from a type name, keeping generic arguments.
///
/// `alloc::vec::Vec<i32>` becomes `Vec<i32>`.
fn short_type_name(full: &str) -> String {
    let generic_start = full.find('<').unwrap_or(full.len());
    let (head, tail) = full.split_at(generic_start);
    let base = head.rsplit("::").next().unwrap_or(head);
    format!("{base}{tail}")
}

/// How a captured call ended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CallOutcome {
    /// Still on the stack when the run ended.
    Pending,
    Returned(CapturedValue),
    Raised(CapturedValue),
}

/// One observed call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    /// Position in the run, starting at 0.
    pub seq: usize,
    /// `seq` of the enclosing captured call, if any.
    pub parent: Option<usize>,
    /// Module the callable lives in, as a locator or subpath.
    pub module: String,
    /// Function name, or `Class.method`.
    pub callable: String,
    pub args: Vec<(String, CapturedValue)>,
    pub outcome: CallOutcome,
}

impl CallRecord {
    pub fn returned(&self) -> Option<&CapturedValue> {
        match &self.outcome {
            CallOutcome::Returned(v) => Some(v),
            _ => None,
        }
    }

    pub fn raised(&self) -> Option<&CapturedValue> {
        match &self.outcome {
            CallOutcome::Raised(v) => Some(v),
            _ => None,
        }
    }
}

/// Collects the call graph of a single run.
///
/// Runners call [`enter`](Recorder::enter) when a call starts and
/// [`returned`](Recorder::returned) or [`raised`](Recorder::raised) when it
/// ends. Nested calls record the call that was on top of the stack as their
/// parent.
#[derive(Debug, Default)]
pub struct Recorder {
    calls: Vec<CallRecord>,
    stack: Vec<usize>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start of a call and return its sequence number.
    pub fn enter(
        &mut self,
        module: impl Into<String>,
        callable: impl Into<String>,
        args: Vec<(String, CapturedValue)>,
    ) -> usize {
        let seq = self.calls.len();
        self.calls.push(CallRecord {
            seq,
            parent: self.stack.last().copied(),
            module: module.into(),
            callable: callable.into(),
            args,
            outcome: CallOutcome::Pending,
        });
        self.stack.push(seq);
        seq
    }

    /// The innermost open call returned `value`.
    ///
    /// Returns the closed call's sequence number, or `None` if no call was
    /// open.
    pub fn returned(&mut self, value: CapturedValue) -> Option<usize> {
        self.close(CallOutcome::Returned(value))
    }

    /// The innermost open call raised `value`.
    pub fn raised(&mut self, value: CapturedValue) -> Option<usize> {
        self.close(CallOutcome::Raised(value))
    }

    fn close(&mut self, outcome: CallOutcome) -> Option<usize> {
        let Some(seq) = self.stack.pop() else {
            warn!("call exit reported with no open call");
            return None;
        };
        if let Some(call) = self.calls.get_mut(seq) {
            call.outcome = outcome;
        }
        Some(seq)
    }

    /// Number of calls still open.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn calls(&self) -> &[CallRecord] {
        &self.calls
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Stop recording. Calls still open stay [`CallOutcome::Pending`].
    pub fn finish(self) -> Vec<CallRecord> {
        if !self.stack.is_empty() {
            debug!(open = self.stack.len(), "run ended with open calls");
        }
        self.calls
    }
}
