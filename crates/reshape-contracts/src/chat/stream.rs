use serde_json::Value;

use super::message::{ChatMessage, MessagePart, ToolCallPart, ToolState};

/// Wire format of a chat completion response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFormat {
    /// `<code>:<json>` lines (`0:` text, `9:` tool call, `a:` tool result, `3:` error, `d:` finish).
    DataStream,
    /// Server-sent events carrying UI message chunks as `data: {...}`.
    EventStream,
    /// Raw text deltas with no framing.
    PlainText,
}

impl StreamFormat {
    pub fn detect(content_type: Option<&str>, data_stream_marker: bool) -> Self {
        let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
        if content_type.contains("text/event-stream") {
            return Self::EventStream;
        }
        if data_stream_marker {
            return Self::DataStream;
        }
        Self::PlainText
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamFragment {
    TextDelta(String),
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        input: Value,
    },
    ToolResult {
        tool_call_id: String,
        output: Value,
    },
    Error(String),
    Finish,
}

/// Incremental decoder. Bytes may arrive split anywhere, including inside a UTF-8 sequence.
#[derive(Debug)]
pub struct StreamDecoder {
    format: StreamFormat,
    buffer: Vec<u8>,
}

impl StreamDecoder {
    pub fn new(format: StreamFormat) -> Self {
        Self {
            format,
            buffer: Vec::new(),
        }
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamFragment> {
        self.buffer.extend_from_slice(chunk);
        match self.format {
            StreamFormat::PlainText => self.drain_text(false),
            StreamFormat::DataStream | StreamFormat::EventStream => self.drain_lines(),
        }
    }

    pub fn finish(&mut self) -> Vec<StreamFragment> {
        match self.format {
            StreamFormat::PlainText => self.drain_text(true),
            StreamFormat::DataStream | StreamFormat::EventStream => {
                let rest = std::mem::take(&mut self.buffer);
                let line = String::from_utf8_lossy(&rest);
                self.decode_line(line.trim_end_matches('\r'))
                    .into_iter()
                    .collect()
            }
        }
    }

    fn drain_text(&mut self, flush: bool) -> Vec<StreamFragment> {
        let valid = match std::str::from_utf8(&self.buffer) {
            Ok(text) => text.len(),
            Err(_) if flush => self.buffer.len(),
            // Invalid bytes are never completed by later chunks; incomplete tails can be.
            Err(err) if err.error_len().is_some() => self.buffer.len(),
            Err(err) => err.valid_up_to(),
        };
        if valid == 0 {
            return Vec::new();
        }
        let head: Vec<u8> = self.buffer.drain(..valid).collect();
        let text = String::from_utf8_lossy(&head).into_owned();
        vec![StreamFragment::TextDelta(text)]
    }

    fn drain_lines(&mut self) -> Vec<StreamFragment> {
        let mut out = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
            if let Some(fragment) = self.decode_line(line.trim_end_matches('\r')) {
                out.push(fragment);
            }
        }
        out
    }

    fn decode_line(&self, line: &str) -> Option<StreamFragment> {
        if line.trim().is_empty() {
            return None;
        }
        match self.format {
            StreamFormat::DataStream => decode_data_stream_line(line),
            StreamFormat::EventStream => decode_event_stream_line(line),
            StreamFormat::PlainText => Some(StreamFragment::TextDelta(line.to_string())),
        }
    }
}

fn decode_data_stream_line(line: &str) -> Option<StreamFragment> {
    let (code, raw) = line.split_once(':')?;
    let value: Value = serde_json::from_str(raw).ok()?;
    match code {
        "0" => value.as_str().map(|text| StreamFragment::TextDelta(text.to_string())),
        "9" => Some(StreamFragment::ToolCall {
            tool_call_id: string_field(&value, "toolCallId"),
            tool_name: string_field(&value, "toolName"),
            input: value.get("args").cloned().unwrap_or(Value::Null),
        }),
        "a" => Some(StreamFragment::ToolResult {
            tool_call_id: string_field(&value, "toolCallId"),
            output: value.get("result").cloned().unwrap_or(Value::Null),
        }),
        "3" => Some(StreamFragment::Error(
            value
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string()),
        )),
        "d" => Some(StreamFragment::Finish),
        // End of one model step; the turn continues until `d:`.
        "e" => None,
        _ => None,
    }
}

fn decode_event_stream_line(line: &str) -> Option<StreamFragment> {
    let data = line.strip_prefix("data:")?.trim();
    if data == "[DONE]" {
        return Some(StreamFragment::Finish);
    }
    let value: Value = serde_json::from_str(data).ok()?;
    match value.get("type").and_then(Value::as_str)? {
        "text-delta" => value
            .get("delta")
            .or_else(|| value.get("textDelta"))
            .and_then(Value::as_str)
            .map(|text| StreamFragment::TextDelta(text.to_string())),
        "tool-input-available" => Some(StreamFragment::ToolCall {
            tool_call_id: string_field(&value, "toolCallId"),
            tool_name: string_field(&value, "toolName"),
            input: value.get("input").cloned().unwrap_or(Value::Null),
        }),
        "tool-output-available" => Some(StreamFragment::ToolResult {
            tool_call_id: string_field(&value, "toolCallId"),
            output: value.get("output").cloned().unwrap_or(Value::Null),
        }),
        "error" => Some(StreamFragment::Error(string_field(&value, "errorText"))),
        "finish" => Some(StreamFragment::Finish),
        _ => None,
    }
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Folds stream fragments into a single assistant turn.
#[derive(Debug, Default)]
pub struct TurnAssembler {
    parts: Vec<MessagePart>,
    fragments: usize,
    finished: bool,
    error: Option<String>,
}

impl TurnAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: StreamFragment) {
        self.fragments += 1;
        match fragment {
            StreamFragment::TextDelta(delta) => {
                if delta.is_empty() {
                    return;
                }
                if let Some(MessagePart::Text { text }) = self.parts.last_mut() {
                    text.push_str(&delta);
                } else {
                    self.parts.push(MessagePart::Text { text: delta });
                }
            }
            StreamFragment::ToolCall {
                tool_call_id,
                tool_name,
                input,
            } => self.parts.push(MessagePart::ToolCall(ToolCallPart {
                tool_call_id,
                tool_name,
                state: ToolState::Pending,
                input,
                output: Value::Null,
            })),
            StreamFragment::ToolResult {
                tool_call_id,
                output,
            } => {
                let existing = self.parts.iter_mut().find_map(|part| match part {
                    MessagePart::ToolCall(call) if call.tool_call_id == tool_call_id => Some(call),
                    _ => None,
                });
                match existing {
                    Some(call) => {
                        call.state = ToolState::Result;
                        call.output = output;
                    }
                    None => self.parts.push(MessagePart::ToolCall(ToolCallPart {
                        tool_call_id,
                        tool_name: String::new(),
                        state: ToolState::Result,
                        input: Value::Null,
                        output,
                    })),
                }
            }
            StreamFragment::Error(message) => {
                if self.error.is_none() {
                    self.error = Some(message);
                }
            }
            StreamFragment::Finish => self.finished = true,
        }
    }

    pub fn fragments(&self) -> usize {
        self.fragments
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn into_message(self) -> ChatMessage {
        ChatMessage::assistant(self.parts)
    }
}
