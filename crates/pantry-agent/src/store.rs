use serde::Serialize;
use tokio::sync::watch;

use crate::models::message::AgentMessage;
use crate::models::role::Role;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Thinking,
    Fetching,
    Responding,
}

/// Everything the UI needs to render a conversation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    pub history: Vec<AgentMessage>,
    pub phase: Phase,
    pub busy: bool,
    pub retry_available: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct AppendOptions {
    pub dedupe: bool,
}

impl Default for AppendOptions {
    fn default() -> Self {
        Self { dedupe: true }
    }
}

/// Ordered conversation history plus phase and retry signals.
///
/// Written only by the orchestration loop (and the initial user append);
/// readers subscribe and get a fresh snapshot on every change.
pub struct MessageStore {
    state: watch::Sender<ConversationState>,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore {
    pub fn new() -> Self {
        Self {
            state: watch::Sender::new(ConversationState::default()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ConversationState> {
        self.state.subscribe()
    }

    pub fn append(&self, message: AgentMessage) {
        self.append_with(message, AppendOptions::default());
    }

    /// Append a message. With `dedupe`, a message repeating the previous one's role and
    /// content replaces it, unless either side carries tool plumbing.
    pub fn append_with(&self, message: AgentMessage, options: AppendOptions) {
        self.state.send_modify(|state| {
            let replace_last = options.dedupe
                && state
                    .history
                    .last()
                    .is_some_and(|last| is_duplicate(last, &message));
            if replace_last {
                state.history.pop();
            }
            state.history.push(message);
        });
    }

    pub fn snapshot(&self) -> Vec<AgentMessage> {
        self.state.borrow().history.clone()
    }

    pub fn replace(&self, history: Vec<AgentMessage>) {
        self.state.send_modify(|state| state.history = history);
    }

    /// History without UI-hidden anchors
    pub fn visible(&self) -> Vec<AgentMessage> {
        self.state
            .borrow()
            .history
            .iter()
            .filter(|message| !message.ui_hidden)
            .cloned()
            .collect()
    }

    /// Drop everything after the last user message. Returns false when there is none.
    pub fn truncate_to_last_user(&self) -> bool {
        let mut found = false;
        self.state.send_modify(|state| {
            if let Some(index) = state.history.iter().rposition(|m| m.role == Role::User) {
                state.history.truncate(index + 1);
                found = true;
            }
        });
        found
    }

    pub fn set_phase(&self, phase: Phase) {
        self.state.send_if_modified(|state| {
            if state.phase == phase {
                return false;
            }
            state.phase = phase;
            state.busy = phase != Phase::Idle;
            true
        });
    }

    pub fn phase(&self) -> Phase {
        self.state.borrow().phase
    }

    pub fn is_busy(&self) -> bool {
        self.state.borrow().busy
    }

    pub fn set_retry_available(&self, available: bool) {
        self.state.send_if_modified(|state| {
            let changed = state.retry_available != available;
            state.retry_available = available;
            changed
        });
    }

    pub fn retry_available(&self) -> bool {
        self.state.borrow().retry_available
    }

    pub fn has_tool_result(&self, call_id: &str) -> bool {
        self.state
            .borrow()
            .history
            .iter()
            .any(|message| message.is_tool_result_for(call_id))
    }

    /// Earliest recorded result for a call id
    pub fn tool_result_for(&self, call_id: &str) -> Option<AgentMessage> {
        self.state
            .borrow()
            .history
            .iter()
            .find(|message| message.is_tool_result_for(call_id))
            .cloned()
    }

    /// Place a tool result right after the results already following its anchor, the
    /// most recent assistant turn requesting that call id. Returns false when no such
    /// anchor exists and nothing was recorded.
    pub fn record_tool_result(&self, message: AgentMessage) -> bool {
        let Some(call_id) = message.tool_call_id.clone() else {
            return false;
        };

        self.state.send_if_modified(|state| {
            let history = &mut state.history;
            let Some(anchor) = history.iter().rposition(|m| {
                m.role == Role::Assistant && m.tool_calls.iter().any(|c| c.id == call_id)
            }) else {
                return false;
            };

            let position = history[anchor + 1..]
                .iter()
                .position(|m| m.role != Role::Tool)
                .map_or(history.len(), |offset| anchor + 1 + offset);
            history.insert(position, message);
            true
        })
    }

    /// Call ids of the most recent tool-calling assistant turn with no result after it
    pub fn unanswered_tool_calls(&self) -> Vec<String> {
        let state = self.state.borrow();
        let history = &state.history;
        let Some(index) = history
            .iter()
            .rposition(|m| m.role == Role::Assistant && m.has_tool_calls())
        else {
            return Vec::new();
        };

        let answers = &history[index + 1..];
        history[index]
            .tool_calls
            .iter()
            .filter(|call| !answers.iter().any(|m| m.is_tool_result_for(&call.id)))
            .map(|call| call.id.clone())
            .collect()
    }

    /// Latest non-empty assistant text written after the last user message
    pub fn latest_assistant_reply(&self) -> Option<AgentMessage> {
        self.state
            .borrow()
            .history
            .iter()
            .rev()
            .take_while(|m| m.role != Role::User)
            .find(|m| m.role == Role::Assistant && !m.ui_hidden && !m.content.trim().is_empty())
            .cloned()
    }
}

fn is_duplicate(last: &AgentMessage, next: &AgentMessage) -> bool {
    last.role == next.role
        && last.content == next.content
        && !last.has_tool_calls()
        && !next.has_tool_calls()
        && last.tool_call_id.is_none()
        && next.tool_call_id.is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tool::RawToolCall;

    fn anchor(ids: &[&str]) -> AgentMessage {
        AgentMessage::assistant("")
            .with_tool_calls(
                ids.iter()
                    .map(|id| RawToolCall::new(*id, "addProduct", "{}"))
                    .collect(),
            )
            .hidden()
    }

    #[test]
    fn test_duplicate_placeholder_is_replaced() {
        let store = MessageStore::new();
        store.append(AgentMessage::user("add milk"));
        store.append(AgentMessage::assistant("Processing..."));
        store.append(AgentMessage::assistant("Processing..."));

        let history = store.snapshot();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, "Processing...");
    }

    #[test]
    fn test_dedupe_can_be_disabled() {
        let store = MessageStore::new();
        store.append(AgentMessage::assistant("Processing..."));
        store.append_with(
            AgentMessage::assistant("Processing..."),
            AppendOptions { dedupe: false },
        );
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn test_tool_plumbing_is_never_deduped() {
        let store = MessageStore::new();
        store.append(anchor(&["a"]));
        store.append(anchor(&["a"]));
        store.append(AgentMessage::tool("addProduct", "a", "ok"));
        store.append(AgentMessage::tool("addProduct", "b", "ok"));
        assert_eq!(store.snapshot().len(), 4);
    }

    #[test]
    fn test_phase_drives_busy_flag() {
        let store = MessageStore::new();
        assert!(!store.is_busy());

        store.set_phase(Phase::Thinking);
        assert!(store.is_busy());
        assert_eq!(store.phase(), Phase::Thinking);

        store.set_phase(Phase::Idle);
        assert!(!store.is_busy());
    }

    #[test]
    fn test_truncate_to_last_user() {
        let store = MessageStore::new();
        store.append(AgentMessage::user("first"));
        store.append(AgentMessage::assistant("reply"));
        store.append(AgentMessage::user("second"));
        store.append(anchor(&["a"]));
        store.append(AgentMessage::assistant("Something went wrong"));

        assert!(store.truncate_to_last_user());
        let history = store.snapshot();
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].content, "second");

        let empty = MessageStore::new();
        assert!(!empty.truncate_to_last_user());
    }

    #[test]
    fn test_unanswered_tool_calls() {
        let store = MessageStore::new();
        store.append(AgentMessage::user("add milk and eggs"));
        store.append(anchor(&["a", "b"]));
        assert_eq!(store.unanswered_tool_calls(), vec!["a", "b"]);

        store.append(AgentMessage::tool("addProduct", "a", "ok"));
        assert_eq!(store.unanswered_tool_calls(), vec!["b"]);
        assert!(store.has_tool_result("a"));

        store.append(AgentMessage::tool("addProduct", "b", "ok"));
        assert!(store.unanswered_tool_calls().is_empty());
    }

    #[test]
    fn test_results_before_the_anchor_do_not_count() {
        let store = MessageStore::new();
        store.append(anchor(&["a"]));
        store.append(AgentMessage::tool("addProduct", "a", "ok"));
        store.append(AgentMessage::user("again"));
        store.append(anchor(&["a"]));

        assert!(store.has_tool_result("a"));
        assert_eq!(store.unanswered_tool_calls(), vec!["a"]);
    }

    #[test]
    fn test_late_result_lands_next_to_its_anchor() {
        let store = MessageStore::new();
        store.append(AgentMessage::user("add milk and eggs"));
        store.append(anchor(&["a", "b"]));
        store.append(AgentMessage::tool("addProduct", "a", "ok"));
        store.append(AgentMessage::user("actually, just eggs"));

        assert!(store.record_tool_result(AgentMessage::tool("addProduct", "b", "late")));

        let history = store.snapshot();
        assert_eq!(history[3].tool_call_id.as_deref(), Some("b"));
        assert_eq!(history[4].content, "actually, just eggs");
        assert!(store.unanswered_tool_calls().is_empty());
        assert_eq!(store.tool_result_for("b").map(|m| m.content).as_deref(), Some("late"));
    }

    #[test]
    fn test_result_without_anchor_is_not_recorded() {
        let store = MessageStore::new();
        store.append(AgentMessage::user("hi"));

        assert!(!store.record_tool_result(AgentMessage::tool("addProduct", "ghost", "ok")));
        assert!(!store.record_tool_result(AgentMessage::assistant("no id")));
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn test_visible_hides_anchors() {
        let store = MessageStore::new();
        store.append(AgentMessage::user("add milk"));
        store.append(anchor(&["a"]));
        store.append(AgentMessage::tool("addProduct", "a", "ok"));

        assert_eq!(store.snapshot().len(), 3);
        assert_eq!(store.visible().len(), 2);
    }

    #[test]
    fn test_latest_reply_is_scoped_to_current_request() {
        let store = MessageStore::new();
        store.append(AgentMessage::user("first"));
        store.append(AgentMessage::assistant("old answer"));
        store.append(AgentMessage::user("second"));
        assert!(store.latest_assistant_reply().is_none());

        store.append(AgentMessage::assistant("new answer"));
        let reply = store.latest_assistant_reply().map(|m| m.content);
        assert_eq!(reply.as_deref(), Some("new answer"));
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() -> anyhow::Result<()> {
        let store = MessageStore::new();
        let mut rx = store.subscribe();

        store.append(AgentMessage::user("hi"));
        rx.changed().await?;
        assert_eq!(rx.borrow_and_update().history.len(), 1);

        store.set_retry_available(true);
        rx.changed().await?;
        assert!(rx.borrow().retry_available);
        Ok(())
    }
}
