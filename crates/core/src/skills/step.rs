//! # Tool Plan Steps
//!
//! The synchronous contract implemented by tool agents. Inputs and outputs
//! are loose JSON mappings; accessors return `None` on a missing or mistyped
//! key instead of failing, leaving the decision to the tool's own validation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single input or output field
pub type StepValue = Value;

macro_rules! value_map {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Map<String, Value>);

        impl $name {
            pub fn new() -> Self {
                Self::default()
            }

            pub fn get(&self, key: &str) -> Option<&StepValue> {
                self.0.get(key)
            }

            pub fn contains(&self, key: &str) -> bool {
                self.0.contains_key(key)
            }

            pub fn get_string(&self, key: &str) -> Option<&str> {
                self.0.get(key).and_then(Value::as_str)
            }

            /// Integers only; `"5"` and `5.0` are absent
            pub fn get_int(&self, key: &str) -> Option<i64> {
                self.0.get(key).and_then(Value::as_i64)
            }

            pub fn get_bool(&self, key: &str) -> Option<bool> {
                self.0.get(key).and_then(Value::as_bool)
            }

            pub fn get_list(&self, key: &str) -> Option<&Vec<Value>> {
                self.0.get(key).and_then(Value::as_array)
            }

            /// String elements of a list; non-strings are skipped
            pub fn get_string_list(&self, key: &str) -> Option<Vec<String>> {
                self.get_list(key).map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
            }

            pub fn insert(&mut self, key: impl Into<String>, value: impl Into<StepValue>) {
                self.0.insert(key.into(), value.into());
            }

            pub fn with(mut self, key: impl Into<String>, value: impl Into<StepValue>) -> Self {
                self.insert(key, value);
                self
            }

            pub fn len(&self) -> usize {
                self.0.len()
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            pub fn as_map(&self) -> &Map<String, Value> {
                &self.0
            }

            pub fn into_map(self) -> Map<String, Value> {
                self.0
            }
        }

        impl From<Map<String, Value>> for $name {
            fn from(map: Map<String, Value>) -> Self {
                Self(map)
            }
        }
    };
}

value_map!(
    /// Parameters handed to a tool agent
    StepInput
);

value_map!(
    /// Fields produced by a tool agent, surfaced verbatim in responses
    StepOutput
);

/// One unit of work for a tool agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolPlanStep {
    pub id: String,
    pub title: String,
    pub description: String,
    pub agent_type: String,
    pub input: StepInput,
}

/// Where a step came from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub request_id: String,
    pub message_type: String,
    /// Read-only trace data copied from the request
    pub metadata: Map<String, Value>,
}

/// Outcome of a step; built once, never mutated afterwards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub success: bool,
    pub output: StepOutput,
    pub error: Option<String>,
    pub metadata: Map<String, Value>,
}

impl StepResult {
    pub fn success(output: StepOutput) -> Self {
        Self {
            success: true,
            output,
            error: None,
            metadata: Map::new(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: StepOutput::new(),
            error: Some(error.into()),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<StepValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            valid: false,
            errors,
        }
    }
}

/// A synchronous tool agent.
///
/// Both methods may block (file reads, model calls); the adapter runs them
/// on the blocking pool.
pub trait ToolAgent: Send + Sync + 'static {
    fn agent_type(&self) -> &str;

    /// Class name reported in announcements
    fn legacy_class(&self) -> &str;

    fn validate_input(&self, input: &StepInput) -> ValidationResult;

    fn execute_step(&self, step: &ToolPlanStep, context: &ExecutionContext) -> StepResult;
}

/// Shared "required string" check used by the bundled skills
pub(crate) fn require_string(input: &StepInput, key: &str, errors: &mut Vec<String>) {
    match input.get_string(key) {
        Some(s) if !s.trim().is_empty() => {}
        _ => errors.push(format!("Missing required parameter: {}", key)),
    }
}
