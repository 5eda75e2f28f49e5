//! Test cases derived from declared callables and captured calls.

use scope_types::Definition;

use crate::capture::CallRecord;
use crate::execution::Execution;
use crate::module::Module;

/// A captured call together with the execution it came from.
#[derive(Clone, Copy, Debug)]
pub struct ObservedCall<'p> {
    pub execution: &'p Execution,
    pub call: &'p CallRecord,
}

/// Material for one generated test: a declared callable and every call to it
/// observed across the project's executions.
#[derive(Clone, Debug)]
pub struct TestCase<'p> {
    module: &'p Module,
    definition: &'p Definition,
    calls: Vec<ObservedCall<'p>>,
}

impl<'p> TestCase<'p> {
    pub(crate) fn collect(
        module: &'p Module,
        definition: &'p Definition,
        executions: &'p [Execution],
    ) -> Self {
        let calls = executions
            .iter()
            .flat_map(|execution| {
                execution
                    .calls_to(module, definition)
                    .map(move |call| ObservedCall { execution, call })
            })
            .collect();
        Self {
            module,
            definition,
            calls,
        }
    }

    pub fn module(&self) -> &'p Module {
        self.module
    }

    pub fn definition(&self) -> &'p Definition {
        self.definition
    }

    /// Observed calls, in execution order and then call order.
    pub fn calls(&self) -> &[ObservedCall<'p>] {
        &self.calls
    }

    /// Whether any run exercised this callable.
    pub fn is_observed(&self) -> bool {
        !self.calls.is_empty()
    }

    /// Conventional test function name, e.g. `test_function`.
    pub fn test_name(&self) -> String {
        format!("test_{}", self.definition.name().to_lowercase())
    }
}
