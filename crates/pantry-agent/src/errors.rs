use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Normalized failure from the model gateway.
///
/// Callers only need to know whether the failure was a timeout or carried an
/// HTTP status; transport details stay in the logs.
#[derive(Error, Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[error("{user_message}")]
pub struct GatewayError {
    pub status: Option<u16>,
    pub timeout: bool,
    pub user_message: String,
}

impl GatewayError {
    pub fn timeout() -> Self {
        Self {
            status: None,
            timeout: true,
            user_message: "The assistant took too long to respond.".to_string(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status: Some(status),
            timeout: false,
            user_message: format!("The assistant service returned status {}.", status),
        }
    }

    pub fn network<S: Into<String>>(detail: S) -> Self {
        Self {
            status: None,
            timeout: false,
            user_message: detail.into(),
        }
    }

    /// The endpoint answered but the body was an error or unusable
    pub fn rejected() -> Self {
        Self::network("The assistant could not answer this request.")
    }

    /// Timeouts and 502/503/504 are worth another attempt, nothing else is.
    pub fn is_transient(&self) -> bool {
        self.timeout || matches!(self.status, Some(502..=504))
    }
}

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("Model gateway failed: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Model requested a tool but no usable call could be extracted")]
    MalformedToolIntent,

    #[error("Tool calls without results: {}", .call_ids.join(", "))]
    ContractViolation { call_ids: Vec<String> },

    #[error("Iteration budget of {max} round-trips exceeded")]
    IterationBudgetExceeded { max: usize },

    #[error("Model returned no usable reply")]
    NoAssistantReply,

    #[error("Turn was superseded")]
    Cancelled,

    #[error("No failed turn to retry")]
    RetryUnavailable,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Short stable label used in telemetry payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::Gateway(err) if err.timeout => "gateway_timeout",
            AgentError::Gateway(_) => "gateway",
            AgentError::MalformedToolIntent => "malformed_tool_intent",
            AgentError::ContractViolation { .. } => "contract_violation",
            AgentError::IterationBudgetExceeded { .. } => "iteration_budget",
            AgentError::NoAssistantReply => "no_reply",
            AgentError::Cancelled => "cancelled",
            AgentError::RetryUnavailable => "retry_unavailable",
            AgentError::Internal(_) => "internal",
        }
    }
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Failures raised from inside a tool handler. The executor turns these into
/// tool messages, they never reach the loop as errors.
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum ToolError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ToolResult<T> = Result<T, ToolError>;
