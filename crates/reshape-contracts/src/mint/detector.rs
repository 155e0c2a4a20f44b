//! Finds a prepared mint transaction in a completed assistant turn.
//!
//! Strategies run in a fixed order and the first accepted payload wins:
//! the whole text as JSON, the first fenced ```` ```json ```` block, a loose
//! `{ ... }` span that mentions the mint function, and finally typed tool-call
//! parts from the mint tool. A payload that fails to parse or is rejected at
//! one level falls through to the next; nothing is reported to the caller.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::payload::{PendingTransaction, MINT_FUNCTION_NAME, MINT_TOOL_NAME};
use crate::chat::{ChatMessage, Role, ToolCallPart};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("`success` is not true")]
    NotSuccessful,
    #[error("`transaction` is missing or empty")]
    EmptyTransaction,
    #[error("`metadata.functionName` is {0:?}, expected {MINT_FUNCTION_NAME:?}")]
    WrongFunction(Option<String>),
    #[error("payload shape is invalid: {0}")]
    Malformed(String),
}

type TextAttempt = fn(&str) -> Option<PendingTransaction>;

const TEXT_ATTEMPTS: &[TextAttempt] = &[from_full_text, from_fenced_block, from_loose_object];

/// Checks one assistant turn. User turns never carry a transaction.
pub fn detect_pending_transaction(message: &ChatMessage) -> Option<PendingTransaction> {
    if message.role() != Role::Assistant {
        return None;
    }
    detect_in_text(&message.text()).or_else(|| detect_in_tool_calls(message.tool_calls()))
}

pub fn detect_in_text(text: &str) -> Option<PendingTransaction> {
    if text.trim().is_empty() {
        return None;
    }
    first_accepted(text, TEXT_ATTEMPTS)
}

fn first_accepted(text: &str, attempts: &[TextAttempt]) -> Option<PendingTransaction> {
    attempts.iter().find_map(|attempt| attempt(text))
}

pub fn detect_in_tool_calls<'a>(
    calls: impl IntoIterator<Item = &'a ToolCallPart>,
) -> Option<PendingTransaction> {
    calls
        .into_iter()
        .filter(|call| call.tool_name == MINT_TOOL_NAME && call.is_result())
        .find_map(|call| {
            let output = decode_tool_output(&call.output)?;
            accept_logged("tool_call", &output)
        })
}

/// Validates a parsed payload against the mint contract.
pub fn accept(value: &Value) -> Result<PendingTransaction, Rejection> {
    let object = value.as_object().ok_or(Rejection::NotAnObject)?;
    if object.get("success") != Some(&Value::Bool(true)) {
        return Err(Rejection::NotSuccessful);
    }
    match object.get("transaction") {
        Some(Value::Object(fields)) if !fields.is_empty() => {}
        _ => return Err(Rejection::EmptyTransaction),
    }
    let function_name = object
        .get("metadata")
        .and_then(|metadata| metadata.get("functionName"))
        .and_then(Value::as_str);
    if function_name != Some(MINT_FUNCTION_NAME) {
        return Err(Rejection::WrongFunction(function_name.map(str::to_string)));
    }
    serde_json::from_value(value.clone()).map_err(|err| Rejection::Malformed(err.to_string()))
}

fn accept_logged(strategy: &str, value: &Value) -> Option<PendingTransaction> {
    match accept(value) {
        Ok(pending) => Some(pending),
        Err(rejection) => {
            tracing::debug!(strategy, reason = %rejection, "mint payload candidate rejected");
            None
        }
    }
}

fn from_full_text(text: &str) -> Option<PendingTransaction> {
    let value: Value = serde_json::from_str(text.trim()).ok()?;
    accept_logged("full_text", &value)
}

fn from_fenced_block(text: &str) -> Option<PendingTransaction> {
    let captures = fenced_block_pattern()?.captures(text)?;
    let value: Value = serde_json::from_str(captures.get(1)?.as_str()).ok()?;
    accept_logged("fenced_block", &value)
}

fn from_loose_object(text: &str) -> Option<PendingTransaction> {
    let found = loose_object_pattern()?.find(text)?;
    let value: Value = serde_json::from_str(found.as_str()).ok()?;
    accept_logged("loose_object", &value)
}

/// Tool results arrive as an object, as a JSON string, or wrapped in an MCP
/// `content: [{type: "text", text}]` envelope.
fn decode_tool_output(output: &Value) -> Option<Value> {
    match output {
        Value::String(raw) => serde_json::from_str(raw).ok(),
        Value::Object(fields) if !fields.contains_key("success") => {
            let text = fields
                .get("content")?
                .as_array()?
                .iter()
                .find(|item| item.get("type").and_then(Value::as_str) == Some("text"))?
                .get("text")?
                .as_str()?;
            serde_json::from_str(text).ok()
        }
        Value::Object(_) => Some(output.clone()),
        _ => None,
    }
}

fn fenced_block_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").ok())
        .as_ref()
}

fn loose_object_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r#"(?s)\{.*"success"\s*:\s*true.*"transaction".*"mintNFT".*\}"#).ok()
        })
        .as_ref()
}
