use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use std::collections::HashSet;

use crate::models::message::AgentMessage;
use crate::models::role::Role;
use crate::models::tool::Tool;

/// Convert conversation history to the completion request message format.
///
/// UI-hidden anchors are still sent: they carry the tool calls the following
/// tool messages answer.
pub fn messages_to_wire(messages: &[AgentMessage]) -> Vec<Value> {
    messages
        .iter()
        .map(|message| {
            let mut converted = json!({
                "role": message.role,
                "content": message.text_for_model(),
            });

            match message.role {
                Role::Assistant if message.has_tool_calls() => {
                    converted["tool_calls"] = json!(message.tool_calls);
                }
                Role::Tool => {
                    if let Some(id) = &message.tool_call_id {
                        converted["tool_call_id"] = json!(id);
                    }
                    if let Some(name) = &message.tool_name {
                        converted["name"] = json!(name);
                    }
                }
                _ => {}
            }

            converted
        })
        .collect()
}

/// Convert the tool catalog to the request format, rejecting duplicate names
pub fn tools_to_wire(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        result.push(json!({
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }));
    }

    Ok(result)
}
