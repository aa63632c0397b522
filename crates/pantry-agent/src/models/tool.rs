use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::message::AgentMessage;

/// A tool that can be used by a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    /// The name of the tool
    pub name: String,
    /// A description of what the tool does
    #[serde(default)]
    pub description: String,
    /// JSON schema with `properties` and `required`
    pub parameters: Value,
}

impl Tool {
    /// Create a new tool with the given name and description
    pub fn new<N, D>(name: N, description: D, parameters: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Tool {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Declared type of a parameter, if the schema names one
    pub fn property_type(&self, key: &str) -> Option<&str> {
        self.parameters
            .get("properties")?
            .get(key)?
            .get("type")?
            .as_str()
    }

    pub fn required(&self) -> Vec<&str> {
        self.parameters
            .get("required")
            .and_then(Value::as_array)
            .map(|keys| keys.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// A normalized tool call ready for the executor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Always a key/value map by the time it gets here
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new<I: Into<String>, N: Into<String>>(
        id: I,
        name: N,
        arguments: Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawFunction {
    pub name: String,
    /// JSON-encoded arguments
    pub arguments: String,
}

/// The wire representation of a call, replayed verbatim to the model on the next turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: RawFunction,
}

impl RawToolCall {
    pub fn new<I, N, A>(id: I, name: N, arguments: A) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        A: Into<String>,
    {
        Self {
            id: id.into(),
            kind: "function".to_string(),
            function: RawFunction {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// Outcome of running one tool call. Failures are data here, never errors.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolExecution {
    pub tool: String,
    pub success: bool,
    pub message: AgentMessage,
}
