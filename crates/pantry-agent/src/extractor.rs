use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::models::response::ModelResponse;
use crate::models::tool::{RawToolCall, ToolCall};

/// Longest call id handed to downstream systems
pub const MAX_TOOL_CALL_ID_LEN: usize = 40;

static CALL_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Tool calls pulled out of one model response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub calls: Vec<ToolCall>,
    /// Wire form of `calls`, same order and ids
    pub raw_tool_calls: Vec<RawToolCall>,
    /// The model attempted at least one call we could not resolve
    pub had_tool_intent: bool,
    pub content: Option<String>,
}

impl Extraction {
    pub fn is_plain_text(&self) -> bool {
        self.calls.is_empty() && !self.had_tool_intent
    }
}

struct Candidate<'a> {
    name: Option<String>,
    id: Option<&'a str>,
    arguments: Option<&'a Value>,
}

/// Normalize any supported response shape into a canonical list of calls
pub fn extract_tool_calls(response: &ModelResponse) -> Extraction {
    let candidates: Vec<Candidate> = match response {
        ModelResponse::Text { .. } => Vec::new(),
        ModelResponse::SingleTool {
            tool,
            arguments,
            tool_call_id,
            ..
        } => vec![Candidate {
            name: resolve_name(Some(tool)),
            id: tool_call_id.as_deref(),
            arguments: arguments.as_ref(),
        }],
        ModelResponse::MultiTool { tool_calls, .. } => tool_calls
            .iter()
            .filter(|raw| !raw.is_null())
            .map(|raw| {
                let function = raw.get("function");
                Candidate {
                    name: resolve_name(function.and_then(|f| f.get("name")))
                        .or_else(|| resolve_name(raw.get("name"))),
                    id: raw.get("id").and_then(Value::as_str),
                    arguments: function
                        .and_then(|f| f.get("arguments"))
                        .or_else(|| raw.get("arguments")),
                }
            })
            .collect(),
    };

    let mut extraction = Extraction {
        content: response.content().map(str::to_string),
        ..Default::default()
    };
    let mut used_ids = HashSet::new();

    for candidate in candidates {
        let Some(name) = candidate.name else {
            tracing::warn!("Model produced a tool call without a usable name");
            extraction.had_tool_intent = true;
            continue;
        };

        let id = normalize_call_id(candidate.id.unwrap_or_default(), &used_ids);
        used_ids.insert(id.clone());

        let arguments = parse_arguments(candidate.arguments);
        let encoded = Value::Object(arguments.clone()).to_string();

        extraction
            .raw_tool_calls
            .push(RawToolCall::new(id.clone(), name.clone(), encoded));
        extraction.calls.push(ToolCall::new(id, name, arguments));
    }

    extraction
}

fn resolve_name(value: Option<&Value>) -> Option<String> {
    let name = value?.as_str()?.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Trim, shorten oversized ids to a stable hash, and replace empty or repeated ids
pub fn normalize_call_id(candidate: &str, used: &HashSet<String>) -> String {
    let trimmed = candidate.trim();
    let id = if trimmed.chars().count() > MAX_TOOL_CALL_ID_LEN {
        hash_call_id(trimmed)
    } else {
        trimmed.to_string()
    };

    if id.is_empty() || used.contains(&id) {
        generate_call_id()
    } else {
        id
    }
}

/// Deterministic short form of an oversized id
pub fn hash_call_id(id: &str) -> String {
    let digest = Sha256::digest(id.as_bytes());
    let hex = format!("{:x}", digest);
    format!("call_{}", &hex[..24])
}

pub fn generate_call_id() -> String {
    let sequence = CALL_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!(
        "call_{:x}{:x}_{}",
        Utc::now().timestamp_millis(),
        sequence,
        nanoid::nanoid!(8)
    )
}

/// Arguments always come out as a map: JSON strings are parsed, anything
/// else that is not an object is kept under `value`
pub fn parse_arguments(arguments: Option<&Value>) -> Map<String, Value> {
    match arguments {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(raw)) if raw.trim().is_empty() => Map::new(),
        Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            _ => wrap_value(Value::String(raw.clone())),
        },
        Some(other) => wrap_value(other.clone()),
    }
}

fn wrap_value(value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("value".to_string(), value);
    map
}
