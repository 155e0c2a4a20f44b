use std::io::Read;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use reshape_contracts::chat::{
    ChatMessage, MessagePart, StreamDecoder, StreamFormat, StreamFragment, TurnAssembler,
};
use reshape_contracts::mint::{detect_pending_transaction, PendingTransaction};
use serde_json::{json, Value};

use crate::context::{Notice, StudioContext};
use crate::error::StudioError;
use crate::http::{build_client, error_chain_text, truncate_text};

const DATA_STREAM_HEADER: &str = "x-vercel-ai-data-stream";
const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Sends the conversation and feeds decoded fragments to `sink` as they arrive.
pub trait ChatTransport: Send + Sync {
    fn name(&self) -> &str;
    fn stream(
        &self,
        messages: &[ChatMessage],
        sink: &mut dyn FnMut(StreamFragment),
    ) -> Result<()>;
}

pub struct HttpChatTransport {
    url: String,
    http: HttpClient,
}

impl HttpChatTransport {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            url: url.into(),
            http: build_client()?,
        })
    }
}

impl ChatTransport for HttpChatTransport {
    fn name(&self) -> &str {
        "http"
    }

    fn stream(
        &self,
        messages: &[ChatMessage],
        sink: &mut dyn FnMut(StreamFragment),
    ) -> Result<()> {
        let payload = json!({
            "messages": messages.iter().map(wire_message).collect::<Vec<_>>(),
        });
        let mut response = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .with_context(|| format!("chat request failed ({})", self.url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!(
                "chat endpoint returned {}: {}",
                status.as_u16(),
                truncate_text(body.trim(), 512)
            );
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let marker = response.headers().contains_key(DATA_STREAM_HEADER);
        let mut decoder = StreamDecoder::new(StreamFormat::detect(content_type.as_deref(), marker));
        tracing::debug!(format = ?decoder.format(), "chat stream opened");

        let mut chunk = vec![0u8; READ_CHUNK_BYTES];
        loop {
            let read = response
                .read(&mut chunk)
                .context("chat stream read failed")?;
            if read == 0 {
                break;
            }
            for fragment in decoder.push(&chunk[..read]) {
                sink(fragment);
            }
        }
        for fragment in decoder.finish() {
            sink(fragment);
        }
        Ok(())
    }
}

/// UI-message shape the chat route converts back into model messages:
/// `text` parts, and tool parts typed `tool-<name>` with an availability state.
fn wire_message(message: &ChatMessage) -> Value {
    let parts: Vec<Value> = message.parts().iter().map(wire_part).collect();
    json!({
        "id": message.id(),
        "role": message.role().as_str(),
        "content": message.text(),
        "parts": parts,
    })
}

fn wire_part(part: &MessagePart) -> Value {
    match part {
        MessagePart::Text { text } => json!({ "type": "text", "text": text }),
        MessagePart::ToolCall(call) => {
            let input = match &call.input {
                Value::Null => json!({}),
                input => input.clone(),
            };
            let state = if call.is_result() {
                "output-available"
            } else {
                "input-available"
            };
            let mut wire = json!({
                "type": format!("tool-{}", call.tool_name),
                "toolCallId": call.tool_call_id,
                "state": state,
                "input": input,
            });
            if call.is_result() {
                wire["output"] = call.output.clone();
            }
            wire
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatStatus {
    Idle,
    Submitted,
    Streaming,
    Error,
}

impl ChatStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Submitted => "submitted",
            Self::Streaming => "streaming",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub message: ChatMessage,
    /// The turn carried a qualifying mint payload.
    pub detected: bool,
    /// The payload filled the empty pending slot.
    pub pending_created: bool,
}

/// Conversation state for one session.
///
/// Status moves `idle -> submitted -> streaming -> idle`; any failure lands in
/// `error` until the next send or retry. The detector runs on each completed
/// assistant turn and at most one pending transaction is held at a time.
pub struct ChatSession {
    transport: Box<dyn ChatTransport>,
    ctx: StudioContext,
    messages: Vec<ChatMessage>,
    status: ChatStatus,
    last_error: Option<String>,
    pending: Option<PendingTransaction>,
}

impl ChatSession {
    pub fn new(transport: Box<dyn ChatTransport>, ctx: StudioContext) -> Self {
        Self {
            transport,
            ctx,
            messages: Vec::new(),
            status: ChatStatus::Idle,
            last_error: None,
            pending: None,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn status(&self) -> ChatStatus {
        self.status
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn pending(&self) -> Option<&PendingTransaction> {
        self.pending.as_ref()
    }

    /// Releases the pending slot so a later turn may fill it.
    pub fn clear_pending(&mut self) -> Option<PendingTransaction> {
        let released = self.pending.take();
        if released.is_some() {
            self.ctx.emit("pending_transaction_cleared", json!({}));
        }
        released
    }

    pub fn send(&mut self, text: &str) -> Result<TurnOutcome, StudioError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(StudioError::EmptyPrompt);
        }
        let message = ChatMessage::user(text);
        self.ctx.emit(
            "chat_message_sent",
            json!({
                "message_id": message.id(),
                "text": text,
            }),
        );
        self.messages.push(message);
        self.run_turn()
    }

    /// Re-submits the conversation after a failed turn. The user message is not duplicated.
    pub fn retry(&mut self) -> Result<TurnOutcome, StudioError> {
        if self.status != ChatStatus::Error {
            return Err(StudioError::NothingToRetry);
        }
        self.ctx
            .emit("chat_retry", json!({ "messages": self.messages.len() }));
        self.run_turn()
    }

    fn run_turn(&mut self) -> Result<TurnOutcome, StudioError> {
        self.last_error = None;
        set_status(&self.ctx, &mut self.status, ChatStatus::Submitted);

        let mut assembler = TurnAssembler::new();
        let Self {
            transport,
            ctx,
            messages,
            status,
            ..
        } = self;
        let streamed = transport.stream(messages.as_slice(), &mut |fragment| {
            if *status == ChatStatus::Submitted {
                set_status(ctx, status, ChatStatus::Streaming);
            }
            assembler.push(fragment);
        });

        if let Err(err) = streamed {
            return Err(self.fail(error_chain_text(&err, 512)));
        }
        if let Some(reason) = assembler.error() {
            let reason = reason.to_string();
            return Err(self.fail(reason));
        }
        if !assembler.is_finished() {
            tracing::debug!(
                fragments = assembler.fragments(),
                "chat stream ended without a finish marker"
            );
        }

        let message = assembler.into_message();
        self.messages.push(message.clone());
        set_status(&self.ctx, &mut self.status, ChatStatus::Idle);
        self.ctx.emit(
            "assistant_turn_completed",
            json!({
                "message_id": message.id(),
                "text": message.text(),
                "tool_calls": message.tool_calls().map(|call| call.tool_name.clone()).collect::<Vec<_>>(),
            }),
        );

        let detected = detect_pending_transaction(&message);
        let outcome = TurnOutcome {
            detected: detected.is_some(),
            pending_created: detected.is_some() && self.pending.is_none(),
            message,
        };
        if let Some(transaction) = detected {
            let payload = json!({
                "message_id": outcome.message.id(),
                "name": transaction.nft_name(),
                "to": transaction.transaction.to,
            });
            if self.pending.is_none() {
                self.ctx.emit("pending_transaction_detected", payload);
                self.pending = Some(transaction);
            } else {
                self.ctx.emit("pending_transaction_ignored", payload);
            }
        }
        Ok(outcome)
    }

    fn fail(&mut self, reason: String) -> StudioError {
        tracing::warn!(reason = %reason, "chat turn failed");
        set_status(&self.ctx, &mut self.status, ChatStatus::Error);
        self.ctx.emit("chat_error", json!({ "error": reason }));
        self.ctx
            .notify(Notice::error("Chat request failed").with_description(display_error(&reason)));
        self.last_error = Some(reason.clone());
        StudioError::Chat(reason)
    }
}

fn set_status(ctx: &StudioContext, status: &mut ChatStatus, next: ChatStatus) {
    if *status == next {
        return;
    }
    *status = next;
    ctx.emit("chat_status", json!({ "status": next.as_str() }));
}

fn display_error(reason: &str) -> String {
    if reason.contains("429") || reason.to_ascii_lowercase().contains("rate limit") {
        return "Rate limit exceeded. Please wait a moment before trying again.".to_string();
    }
    reason.to_string()
}
