use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::role::Role;
use super::tool::RawToolCall;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One turn in the conversation
pub struct AgentMessage {
    pub id: String,
    pub role: Role,
    /// Text shown to the user, may be empty for tool-call-only assistant turns
    pub content: String,
    /// Payload sent to the model instead of `content` when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_content: Option<String>,
    #[serde(default)]
    pub status: MessageStatus,
    /// Calls requested by an assistant turn, in the normalized wire shape
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<RawToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Anchors tool results in history without rendering in the UI
    #[serde(default)]
    pub ui_hidden: bool,
    pub created_at: DateTime<Utc>,
}

impl AgentMessage {
    fn new<S: Into<String>>(role: Role, content: S) -> Self {
        AgentMessage {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            model_content: None,
            status: MessageStatus::Ok,
            tool_calls: Vec::new(),
            tool_name: None,
            tool_call_id: None,
            ui_hidden: false,
            created_at: Utc::now(),
        }
    }

    /// Create a new user message with the current timestamp
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message with the current timestamp
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a tool result message attributed to the given call
    pub fn tool<N, I, S>(tool_name: N, tool_call_id: I, content: S) -> Self
    where
        N: Into<String>,
        I: Into<String>,
        S: Into<String>,
    {
        let mut message = Self::new(Role::Tool, content);
        message.tool_name = Some(tool_name.into());
        message.tool_call_id = Some(tool_call_id.into());
        message
    }

    pub fn with_model_content<S: Into<String>>(mut self, model_content: S) -> Self {
        self.model_content = Some(model_content.into());
        self
    }

    pub fn with_status(mut self, status: MessageStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<RawToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.ui_hidden = true;
        self
    }

    /// Same payload under a fresh id and timestamp
    pub fn replayed(&self) -> Self {
        AgentMessage {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            ..self.clone()
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    pub fn is_tool_result_for(&self, call_id: &str) -> bool {
        self.role == Role::Tool && self.tool_call_id.as_deref() == Some(call_id)
    }

    /// The text the model should see for this message
    pub fn text_for_model(&self) -> &str {
        self.model_content.as_deref().unwrap_or(&self.content)
    }
}
