use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Map, Value};

use crate::errors::ToolResult;
use crate::i18n::{self, EnglishTranslator, Translator};
use crate::models::message::{AgentMessage, MessageStatus};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall, ToolExecution};
use crate::schema::{first_invalid_required, sanitize_arguments, Catalog};

/// What a handler hands back for a call it ran.
///
/// Expected domain failures come back as `success: false`; `Err` is reserved
/// for the unexpected and gets contained by the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutcome {
    pub success: bool,
    pub message: AgentMessage,
}

impl HandlerOutcome {
    pub fn ok(message: AgentMessage) -> Self {
        Self {
            success: true,
            message,
        }
    }

    pub fn failed(message: AgentMessage) -> Self {
        Self {
            success: false,
            message,
        }
    }
}

/// Business logic behind one tool name
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Map<String, Value>) -> ToolResult<HandlerOutcome>;
}

type HandlerFn =
    dyn Fn(Map<String, Value>) -> BoxFuture<'static, ToolResult<HandlerOutcome>> + Send + Sync;

struct FnHandler {
    f: Box<HandlerFn>,
}

#[async_trait]
impl ToolHandler for FnHandler {
    async fn call(&self, arguments: Map<String, Value>) -> ToolResult<HandlerOutcome> {
        (self.f)(arguments).await
    }
}

/// Wrap a closure returning a boxed future as a handler
pub fn handler_fn<F>(f: F) -> Arc<dyn ToolHandler>
where
    F: Fn(Map<String, Value>) -> BoxFuture<'static, ToolResult<HandlerOutcome>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnHandler { f: Box::new(f) })
}

/// Runs normalized calls against an injected name-to-handler table
pub struct ToolExecutor {
    tools: Vec<Tool>,
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
    catalog: Catalog,
    translator: Arc<dyn Translator>,
}

impl ToolExecutor {
    pub fn new(tools: Vec<Tool>) -> Self {
        Self {
            tools,
            handlers: HashMap::new(),
            catalog: Catalog::default(),
            translator: Arc::new(EnglishTranslator::default()),
        }
    }

    pub fn with_handler<S: Into<String>>(mut self, name: S, handler: Arc<dyn ToolHandler>) -> Self {
        self.handlers.insert(name.into(), handler);
        self
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = translator;
        self
    }

    /// The tool catalog advertised to the model
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Run one call and wrap the outcome as a tool message.
    ///
    /// Returns `None` only when the result cannot be attributed to a call id.
    pub async fn execute(&self, call: &ToolCall) -> Option<ToolExecution> {
        let tool = self.tools.iter().find(|t| t.name == call.name);
        let arguments = sanitize_arguments(tool, call.arguments.clone(), &self.catalog);

        if let Some(field) = tool.and_then(|t| first_invalid_required(t, &arguments)) {
            tracing::debug!("Rejecting {} call {}: invalid {}", call.name, call.id, field);
            let text = self
                .translator
                .translate(i18n::VALIDATION_FAILED)
                .replace("{field}", &field);
            let envelope = error_envelope("validation_error", &format!("invalid field: {}", field));
            let message = AgentMessage::tool(&call.name, "", text).with_model_content(envelope);
            return self.wrap(call, false, message);
        }

        let Some(handler) = self.handlers.get(&call.name) else {
            tracing::warn!("No handler registered for tool {}", call.name);
            let text = self.translator.translate(i18n::TOOL_UNAVAILABLE);
            let envelope = error_envelope("unknown_tool", &format!("unknown tool: {}", call.name));
            let message = AgentMessage::tool(&call.name, "", text).with_model_content(envelope);
            return self.wrap(call, false, message);
        };

        let outcome = AssertUnwindSafe(handler.call(arguments)).catch_unwind().await;
        match outcome {
            Ok(Ok(outcome)) => self.wrap(call, outcome.success, outcome.message),
            Ok(Err(err)) => {
                tracing::warn!("Tool {} failed: {}", call.name, err);
                self.wrap(call, false, self.failure(call, &err.to_string()))
            }
            Err(_) => {
                tracing::error!("Tool {} panicked", call.name);
                self.wrap(call, false, self.failure(call, "tool handler panicked"))
            }
        }
    }

    fn failure(&self, call: &ToolCall, detail: &str) -> AgentMessage {
        let text = self.translator.translate(i18n::TOOL_FAILED);
        AgentMessage::tool(&call.name, "", text)
            .with_model_content(error_envelope("handler_error", detail))
    }

    fn wrap(&self, call: &ToolCall, success: bool, mut message: AgentMessage) -> Option<ToolExecution> {
        let call_id = Some(call.id.trim())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| {
                message
                    .tool_call_id
                    .as_deref()
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
            });

        let Some(call_id) = call_id else {
            tracing::warn!(
                "Dropping result of {}: no tool call id to attribute it to",
                call.name
            );
            return None;
        };

        message.role = Role::Tool;
        message.tool_name = Some(call.name.clone());
        message.tool_call_id = Some(call_id);
        if !success {
            message.status = MessageStatus::Error;
        }

        Some(ToolExecution {
            tool: call.name.clone(),
            success,
            message,
        })
    }
}

pub(crate) fn error_envelope(code: &str, detail: &str) -> String {
    json!({"ok": false, "error": {"code": code, "message": detail}}).to_string()
}
