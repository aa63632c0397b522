use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{json, Value};

use crate::config::LoopSettings;
use crate::errors::{AgentError, AgentResult};
use crate::executor::{error_envelope, ToolExecutor};
use crate::extractor::extract_tool_calls;
use crate::i18n::{self, EnglishTranslator, Translator};
use crate::models::message::{AgentMessage, MessageStatus};
use crate::models::tool::{ToolCall, ToolExecution};
use crate::providers::base::{ModelGateway, ModelRequest};
use crate::providers::utils::{messages_to_wire, tools_to_wire};
use crate::store::{AppendOptions, MessageStore, Phase};
use crate::telemetry::{post_best_effort, TelemetrySink, TracingTelemetry};

const NO_DEDUPE: AppendOptions = AppendOptions { dedupe: false };

/// Agent drives a tool-calling conversation between the model and the pantry tools
pub struct Agent {
    gateway: Box<dyn ModelGateway>,
    executor: ToolExecutor,
    store: Arc<MessageStore>,
    settings: LoopSettings,
    system_prompt: String,
    translator: Arc<dyn Translator>,
    telemetry: Arc<dyn TelemetrySink>,
    /// Bumped whenever a turn is superseded; loops holding an older value stop
    generation: AtomicU64,
    /// Bumped by `reset`; results from handlers started before it are discarded
    conversation: AtomicU64,
    last_context: Mutex<Option<Value>>,
}

impl Agent {
    /// Create a new Agent with the specified gateway and tool executor
    pub fn new(gateway: Box<dyn ModelGateway>, executor: ToolExecutor) -> Self {
        Self {
            gateway,
            executor,
            store: Arc::new(MessageStore::new()),
            settings: LoopSettings::default(),
            system_prompt: String::new(),
            translator: Arc::new(EnglishTranslator::default()),
            telemetry: Arc::new(TracingTelemetry),
            generation: AtomicU64::new(0),
            conversation: AtomicU64::new(0),
            last_context: Mutex::new(None),
        }
    }

    pub fn with_system_prompt<S: Into<String>>(mut self, system_prompt: S) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_settings(mut self, settings: LoopSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_store(mut self, store: Arc<MessageStore>) -> Self {
        self.store = store;
        self
    }

    pub fn store(&self) -> &Arc<MessageStore> {
        &self.store
    }

    pub fn can_retry(&self) -> bool {
        self.store.retry_available()
    }

    /// Send a user message and run the loop until the model answers in text.
    ///
    /// Every fatal condition resolves to the unified error message. `None` means
    /// the turn was superseded by `cancel`, `reset` or a newer request.
    pub async fn send_message<S: Into<String>>(
        &self,
        text: S,
        context: Option<Value>,
    ) -> Option<AgentMessage> {
        let generation = self.begin_turn();
        *self
            .last_context
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = context.clone();

        self.store.set_retry_available(false);
        self.store.append(AgentMessage::user(text));
        post_best_effort(self.telemetry.as_ref(), "agent.request", None);

        self.run_turn(generation, context).await
    }

    /// Replay the last user message after a failed turn
    pub async fn retry(&self) -> AgentResult<Option<AgentMessage>> {
        if !self.store.retry_available() {
            return Err(AgentError::RetryUnavailable);
        }

        let generation = self.begin_turn();
        if !self.store.truncate_to_last_user() {
            return Err(AgentError::RetryUnavailable);
        }
        self.store.set_retry_available(false);
        post_best_effort(self.telemetry.as_ref(), "agent.retry", None);

        let context = self
            .last_context
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Ok(self.run_turn(generation, context).await)
    }

    /// Abandon any in-flight turn; it will stop at its next suspension point.
    ///
    /// A tool handler that is already running still gets its result recorded, and
    /// the rest of its batch is closed as cancelled, so the history stays valid.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.store.set_phase(Phase::Idle);
    }

    /// Cancel and start over with an empty conversation
    pub fn reset(&self) {
        self.conversation.fetch_add(1, Ordering::SeqCst);
        self.cancel();
        self.store.replace(Vec::new());
        self.store.set_retry_available(false);
    }

    fn begin_turn(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn ensure_current(&self, generation: u64) -> AgentResult<()> {
        if self.is_current(generation) {
            Ok(())
        } else {
            Err(AgentError::Cancelled)
        }
    }

    async fn run_turn(&self, generation: u64, context: Option<Value>) -> Option<AgentMessage> {
        let outcome = self.reply(generation, context.as_ref()).await;

        if !self.is_current(generation) {
            tracing::debug!("Discarding result of superseded turn {}", generation);
            return None;
        }

        match outcome {
            Ok(reply) => {
                self.store.set_phase(Phase::Idle);
                Some(reply)
            }
            Err(AgentError::Cancelled) => None,
            Err(err) => Some(self.fail_turn(err)),
        }
    }

    fn fail_turn(&self, err: AgentError) -> AgentMessage {
        tracing::error!(kind = err.kind(), "Turn failed: {}", err);
        post_best_effort(
            self.telemetry.as_ref(),
            "agent.unified_error",
            Some(json!({"kind": err.kind()})),
        );

        let message = AgentMessage::assistant(self.translator.translate(i18n::UNIFIED_ERROR))
            .with_status(MessageStatus::Error);
        self.store.append(message.clone());
        self.store.set_retry_available(true);
        self.store.set_phase(Phase::Idle);
        message
    }

    async fn reply(&self, generation: u64, context: Option<&Value>) -> AgentResult<AgentMessage> {
        let tools =
            tools_to_wire(self.executor.tools()).map_err(|e| AgentError::Internal(e.to_string()))?;
        let mut malformed_retry_used = false;

        for iteration in 1..=self.settings.max_iterations {
            self.store.set_phase(Phase::Thinking);
            self.wait_for_pending_results(generation).await?;
            self.assert_tool_results_complete()?;

            let request = ModelRequest {
                system: self.system_prompt.clone(),
                messages: messages_to_wire(&self.store.snapshot()),
                tools: tools.clone(),
                context: context.cloned(),
            };

            tracing::debug!(iteration, "Calling model");
            let response = self.gateway.call(&request).await;
            self.ensure_current(generation)?;
            let extraction = extract_tool_calls(&response?);

            // The anchor goes in before any tool runs so results always have a parent
            let content = extraction.content.as_deref().unwrap_or_default();
            if !extraction.calls.is_empty() {
                let mut anchor = AgentMessage::assistant(content)
                    .with_tool_calls(extraction.raw_tool_calls.clone());
                if content.trim().is_empty() {
                    anchor = anchor.hidden();
                }
                self.store.append_with(anchor, NO_DEDUPE);
            } else if !content.trim().is_empty() {
                self.store.append(AgentMessage::assistant(content));
            }

            if extraction.calls.is_empty() {
                if !extraction.had_tool_intent {
                    self.store.set_phase(Phase::Responding);
                    return self
                        .store
                        .latest_assistant_reply()
                        .ok_or(AgentError::NoAssistantReply);
                }

                if malformed_retry_used {
                    return Err(AgentError::MalformedToolIntent);
                }
                malformed_retry_used = true;
                tracing::warn!("Malformed tool call on iteration {}, asking again", iteration);
                tokio::time::sleep(self.settings.malformed_retry_delay()).await;
                self.ensure_current(generation)?;
                continue;
            }

            self.store.set_phase(Phase::Fetching);
            let conversation = self.conversation.load(Ordering::SeqCst);
            for (index, call) in extraction.calls.iter().enumerate() {
                if let Some(earlier) = self.store.tool_result_for(&call.id) {
                    tracing::debug!("Replaying earlier result of {} call {}", call.name, call.id);
                    self.store.record_tool_result(earlier.replayed());
                    continue;
                }

                let execution = self.executor.execute(call).await;
                if let Some(execution) = execution {
                    self.record_execution(conversation, execution);
                }

                if !self.is_current(generation) {
                    self.close_cancelled_calls(conversation, &extraction.calls[index + 1..]);
                    return Err(AgentError::Cancelled);
                }
            }
        }

        Err(AgentError::IterationBudgetExceeded {
            max: self.settings.max_iterations,
        })
    }

    /// A handler that ran has had its side effect, so its result belongs in the
    /// conversation even when the turn that started it was superseded
    fn record_execution(&self, conversation: u64, execution: ToolExecution) {
        if self.conversation.load(Ordering::SeqCst) != conversation {
            tracing::debug!("Dropping {} result: conversation was reset", execution.tool);
            return;
        }

        post_best_effort(
            self.telemetry.as_ref(),
            "agent.tool_executed",
            Some(json!({"tool": execution.tool, "success": execution.success})),
        );
        let call_id = execution.message.tool_call_id.clone().unwrap_or_default();
        if !self.store.record_tool_result(execution.message) {
            tracing::warn!("Dropping {} result: no anchor for call {}", execution.tool, call_id);
        }
    }

    /// Answer calls a superseded turn will never run
    fn close_cancelled_calls(&self, conversation: u64, calls: &[ToolCall]) {
        if self.conversation.load(Ordering::SeqCst) != conversation {
            return;
        }

        for call in calls {
            let message = match self.store.tool_result_for(&call.id) {
                Some(earlier) => earlier.replayed(),
                None => AgentMessage::tool(
                    &call.name,
                    &call.id,
                    self.translator.translate(i18n::TOOL_CANCELLED),
                )
                .with_model_content(error_envelope("cancelled", "superseded by a newer request"))
                .with_status(MessageStatus::Error),
            };
            self.store.record_tool_result(message);
        }
    }

    /// Give in-flight tool results a moment to land before calling the model
    async fn wait_for_pending_results(&self, generation: u64) -> AgentResult<()> {
        for _ in 0..self.settings.pending_tool_max_checks {
            let pending = self.store.unanswered_tool_calls();
            if pending.is_empty() {
                return Ok(());
            }
            tracing::debug!("Waiting on {} pending tool results", pending.len());
            tokio::time::sleep(self.settings.pending_tool_delay()).await;
            self.ensure_current(generation)?;
        }
        Ok(())
    }

    /// The model API rejects a transcript with unanswered tool calls, so never send one
    fn assert_tool_results_complete(&self) -> AgentResult<()> {
        let missing = self.store.unanswered_tool_calls();
        if missing.is_empty() {
            return Ok(());
        }
        tracing::error!("Tool calls without results before model call: {:?}", missing);
        Err(AgentError::ContractViolation { call_ids: missing })
    }
}
