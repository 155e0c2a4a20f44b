use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolState {
    Pending,
    Result,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallPart {
    pub tool_call_id: String,
    pub tool_name: String,
    pub state: ToolState,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub input: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub output: Value,
}

impl ToolCallPart {
    pub fn is_result(&self) -> bool {
        self.state == ToolState::Result
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessagePart {
    Text { text: String },
    ToolCall(ToolCallPart),
}

/// One conversation entry. Fields are private so an appended message cannot be edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    id: String,
    role: Role,
    parts: Vec<MessagePart>,
}

impl ChatMessage {
    pub fn new(role: Role, parts: Vec<MessagePart>) -> Self {
        Self {
            id: new_message_id(),
            role,
            parts,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![MessagePart::Text { text: text.into() }])
    }

    pub fn assistant(parts: Vec<MessagePart>) -> Self {
        Self::new(Role::Assistant, parts)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn parts(&self) -> &[MessagePart] {
        &self.parts
    }

    /// All text parts joined in order.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                MessagePart::Text { text } => Some(text.as_str()),
                MessagePart::ToolCall(_) => None,
            })
            .collect()
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCallPart> {
        self.parts.iter().filter_map(|part| match part {
            MessagePart::ToolCall(call) => Some(call),
            MessagePart::Text { .. } => None,
        })
    }
}

fn new_message_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("msg-{}", &id[..12])
}
