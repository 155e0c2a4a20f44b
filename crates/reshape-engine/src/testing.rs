use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use reshape_contracts::chat::{ChatMessage, StreamFragment};
use reshape_contracts::events::EventWriter;
use reshape_contracts::images::{
    gateway_url, ipfs_url, GeneratedImage, ImageGenerationRequest, ImageGenerationResponse,
    ImageMetadata,
};
use reshape_contracts::mint::{ChainCall, MINT_TOOL_NAME};
use serde_json::{json, Value};

use crate::chat::ChatTransport;
use crate::context::{NoticeLog, StudioContext};
use crate::images::{GeneratingFlag, ImageEndpoint};
use crate::wallet::{Wallet, WalletError};

pub(crate) const TEST_ADDRESS: &str = "0x1234567890abcdef1234567890abcdef1234abcd";

pub(crate) fn test_context(dir: &Path) -> (StudioContext, Arc<NoticeLog>) {
    let notices = Arc::new(NoticeLog::new());
    let ctx = StudioContext::new(
        EventWriter::new(dir.join("events.jsonl"), "test-session"),
        notices.clone(),
    );
    (ctx, notices)
}

pub(crate) fn mint_payload(name: &str) -> Value {
    json!({
        "success": true,
        "transaction": {
            "to": "0x9f2c6cbd5d1a6f3e0e7b0b1a2c3d4e5f60718293",
            "data": "0x40c10f19",
            "value": "0"
        },
        "metadata": {
            "functionName": "mintNFT",
            "recipient": TEST_ADDRESS,
            "nftMetadata": {"name": name, "description": format!("{name} artwork")}
        }
    })
}

pub(crate) fn text_turn(text: &str) -> Vec<StreamFragment> {
    vec![
        StreamFragment::TextDelta(text.to_string()),
        StreamFragment::Finish,
    ]
}

/// A turn in which the model calls the mint tool. The result arrives in the MCP text envelope.
pub(crate) fn mint_tool_turn(call_id: &str, name: &str) -> Vec<StreamFragment> {
    vec![
        StreamFragment::TextDelta("Preparing your mint transaction.".to_string()),
        StreamFragment::ToolCall {
            tool_call_id: call_id.to_string(),
            tool_name: MINT_TOOL_NAME.to_string(),
            input: json!({"recipientAddress": TEST_ADDRESS}),
        },
        StreamFragment::ToolResult {
            tool_call_id: call_id.to_string(),
            output: json!({
                "content": [{"type": "text", "text": mint_payload(name).to_string()}]
            }),
        },
        StreamFragment::Finish,
    ]
}

pub(crate) enum ChatScript {
    Turn(Vec<StreamFragment>),
    Fail(String),
}

pub(crate) struct MockChatTransport {
    scripts: Mutex<VecDeque<ChatScript>>,
    requests: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl MockChatTransport {
    pub(crate) fn new(scripts: Vec<ChatScript>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Conversation snapshot of every request, in order.
    pub(crate) fn requests(&self) -> Arc<Mutex<Vec<Vec<ChatMessage>>>> {
        self.requests.clone()
    }
}

impl ChatTransport for MockChatTransport {
    fn name(&self) -> &str {
        "mock"
    }

    fn stream(
        &self,
        messages: &[ChatMessage],
        sink: &mut dyn FnMut(StreamFragment),
    ) -> Result<()> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }
        let script = self
            .scripts
            .lock()
            .map_err(|_| anyhow!("mock chat lock poisoned"))?
            .pop_front();
        match script {
            Some(ChatScript::Turn(fragments)) => {
                fragments.into_iter().for_each(sink);
                Ok(())
            }
            Some(ChatScript::Fail(reason)) => Err(anyhow!(reason)),
            None => {
                sink(StreamFragment::Finish);
                Ok(())
            }
        }
    }
}

pub(crate) struct MockImageEndpoint {
    script: Mutex<VecDeque<Result<String, String>>>,
    fallback: Option<String>,
    calls: Arc<AtomicUsize>,
    observed: Option<GeneratingFlag>,
    flag_during_call: Arc<Mutex<Vec<bool>>>,
}

impl MockImageEndpoint {
    /// Every call pins an image at `hash`.
    pub(crate) fn succeeding(hash: &str) -> Self {
        Self::build(Vec::new(), Some(hash.to_string()))
    }

    /// One scripted result per call: `Ok(hash)` or `Err(reason)`.
    pub(crate) fn scripted(script: Vec<Result<String, String>>) -> Self {
        Self::build(script, None)
    }

    fn build(script: Vec<Result<String, String>>, fallback: Option<String>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: Arc::new(AtomicUsize::new(0)),
            observed: None,
            flag_during_call: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn observing(mut self, flag: GeneratingFlag) -> Self {
        self.observed = Some(flag);
        self
    }

    pub(crate) fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    pub(crate) fn flag_during_call(&self) -> Arc<Mutex<Vec<bool>>> {
        self.flag_during_call.clone()
    }
}

impl ImageEndpoint for MockImageEndpoint {
    fn name(&self) -> &str {
        "mock"
    }

    fn generate(&self, request: &ImageGenerationRequest) -> Result<ImageGenerationResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let (Some(flag), Ok(mut seen)) = (&self.observed, self.flag_during_call.lock()) {
            seen.push(flag.is_set());
        }
        let next = self
            .script
            .lock()
            .map_err(|_| anyhow!("mock image lock poisoned"))?
            .pop_front();
        let hash = match (next, &self.fallback) {
            (Some(Ok(hash)), _) => hash,
            (Some(Err(reason)), _) => return Err(anyhow!(reason)),
            (None, Some(hash)) => hash.clone(),
            (None, None) => return Err(anyhow!("no scripted image response")),
        };
        Ok(ImageGenerationResponse {
            success: true,
            image: Some(GeneratedImage {
                ipfs_url: ipfs_url(&hash),
                gateway_url: gateway_url("https://gateway.test", &hash),
                base64: String::new(),
                ipfs_hash: hash,
            }),
            metadata: Some(ImageMetadata {
                name: "AI Generated Artwork".to_string(),
                description: request.prompt.clone(),
                generated_at: "2026-10-16T00:00:00Z".to_string(),
            }),
            error: None,
            details: None,
        })
    }
}

pub(crate) struct MockWallet {
    address: Option<String>,
    outcomes: Mutex<VecDeque<Result<String, WalletError>>>,
    sent: Arc<Mutex<Vec<ChainCall>>>,
}

impl MockWallet {
    pub(crate) fn connected(outcomes: Vec<Result<String, WalletError>>) -> Self {
        let mut wallet = Self::disconnected(outcomes);
        wallet.address = Some(TEST_ADDRESS.to_string());
        wallet
    }

    pub(crate) fn disconnected(outcomes: Vec<Result<String, WalletError>>) -> Self {
        Self {
            address: None,
            outcomes: Mutex::new(outcomes.into()),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn sent(&self) -> Arc<Mutex<Vec<ChainCall>>> {
        self.sent.clone()
    }
}

impl Wallet for MockWallet {
    fn name(&self) -> &str {
        "mock"
    }

    fn connect(&mut self, preferred: Option<&str>) -> Result<String, WalletError> {
        let address = preferred.unwrap_or(TEST_ADDRESS).to_string();
        self.address = Some(address.clone());
        Ok(address)
    }

    fn disconnect(&mut self) {
        self.address = None;
    }

    fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    fn send_transaction(&self, call: &ChainCall) -> Result<String, WalletError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(call.clone());
        }
        self.outcomes
            .lock()
            .map_err(|_| WalletError::Malformed("mock wallet lock poisoned".to_string()))?
            .pop_front()
            .unwrap_or_else(|| Err(WalletError::Rpc {
                code: -32000,
                message: "no scripted outcome".to_string(),
            }))
    }
}
