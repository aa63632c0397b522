use serde_json::{json, Value};

use crate::errors::GatewayError;

/// A completion response, decoded once from whichever wire shape the endpoint used
#[derive(Debug, Clone, PartialEq)]
pub enum ModelResponse {
    /// `{tool, arguments, tool_call_id}` shorthand for a single call
    SingleTool {
        content: Option<String>,
        tool: Value,
        arguments: Option<Value>,
        tool_call_id: Option<String>,
    },
    /// `message.tool_calls` (or `message.toolCalls`) with raw call objects
    MultiTool {
        content: Option<String>,
        tool_calls: Vec<Value>,
    },
    Text { content: Option<String> },
}

impl ModelResponse {
    pub fn text<S: Into<String>>(content: S) -> Self {
        ModelResponse::Text {
            content: Some(content.into()),
        }
    }

    pub fn single_tool<S: Into<String>>(tool: S, arguments: Value, tool_call_id: Option<&str>) -> Self {
        ModelResponse::SingleTool {
            content: None,
            tool: json!(tool.into()),
            arguments: Some(arguments),
            tool_call_id: tool_call_id.map(str::to_string),
        }
    }

    pub fn multi_tool(tool_calls: Vec<Value>) -> Self {
        ModelResponse::MultiTool {
            content: None,
            tool_calls,
        }
    }

    /// Decode a raw completion body.
    ///
    /// A body carrying an `error` string is a failure, not a response. When both
    /// shapes are present the multi-call array wins over the shorthand.
    pub fn from_wire(value: &Value) -> Result<Self, GatewayError> {
        if !value.is_object() {
            tracing::debug!("Completion body is not an object: {}", value);
            return Err(GatewayError::rejected());
        }

        if let Some(error) = value.get("error").and_then(Value::as_str) {
            if !error.trim().is_empty() {
                tracing::debug!("Completion endpoint reported an error: {}", error);
                return Err(GatewayError::rejected());
            }
        }

        let message = value.get("message");
        let content = message
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .or_else(|| value.get("content").and_then(Value::as_str))
            .map(str::to_string);

        let tool_calls = message
            .and_then(|m| m.get("tool_calls").or_else(|| m.get("toolCalls")))
            .and_then(Value::as_array)
            .filter(|calls| !calls.is_empty());

        if let Some(tool_calls) = tool_calls {
            return Ok(ModelResponse::MultiTool {
                content,
                tool_calls: tool_calls.clone(),
            });
        }

        match value.get("tool") {
            Some(tool) if !tool.is_null() => Ok(ModelResponse::SingleTool {
                content,
                tool: tool.clone(),
                arguments: value.get("arguments").cloned(),
                tool_call_id: value
                    .get("tool_call_id")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            }),
            _ => Ok(ModelResponse::Text { content }),
        }
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            ModelResponse::SingleTool { content, .. }
            | ModelResponse::MultiTool { content, .. }
            | ModelResponse::Text { content } => content.as_deref(),
        }
    }
}
