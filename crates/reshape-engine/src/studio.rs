use std::path::Path;

use anyhow::Result;
use reshape_contracts::events::now_utc_iso;
use reshape_contracts::images::{ipfs_url, GeneratedImage};
use reshape_contracts::summary::{write_summary, SessionSummary};
use serde_json::{json, Map, Value};

use crate::chat::{ChatSession, ChatTransport, TurnOutcome};
use crate::config::StudioConfig;
use crate::context::{map_object, Notice, StudioContext};
use crate::error::StudioError;
use crate::images::{ImageEndpoint, ImageGenerationClient, ImageGenerationOutcome};
use crate::mint::{MintState, TransactionHandler};
use crate::wallet::{abbreviate_address, Wallet, WalletError};

/// External collaborators a studio talks to.
pub struct StudioBackends {
    pub chat: Box<dyn ChatTransport>,
    pub images: Box<dyn ImageEndpoint>,
    pub wallet: Box<dyn Wallet>,
}

#[derive(Debug, Clone)]
pub struct PromptOutcome {
    pub image: ImageGenerationOutcome,
    /// Text actually sent to the chat endpoint.
    pub sent_text: String,
    pub turn: TurnOutcome,
    /// A confirmation step was opened by this turn.
    pub mint_ready: bool,
}

/// The create flow: wallet gate, image generation, chat, and mint confirmation.
pub struct Studio {
    config: StudioConfig,
    ctx: StudioContext,
    wallet: Box<dyn Wallet>,
    chat: ChatSession,
    images: ImageGenerationClient,
    mint: Option<TransactionHandler>,
    minted: Vec<Map<String, Value>>,
    images_generated: u64,
    started_at: String,
}

impl Studio {
    pub fn new(config: StudioConfig, backends: StudioBackends, ctx: StudioContext) -> Self {
        ctx.emit(
            "session_started",
            json!({
                "chat_url": config.chat_url(),
                "image_url": config.image_url(),
                "image_endpoint": backends.images.name(),
                "chat_transport": backends.chat.name(),
                "wallet": backends.wallet.name(),
            }),
        );
        Self {
            chat: ChatSession::new(backends.chat, ctx.clone()),
            images: ImageGenerationClient::new(backends.images, ctx.clone()),
            wallet: backends.wallet,
            config,
            ctx,
            mint: None,
            minted: Vec::new(),
            images_generated: 0,
            started_at: now_utc_iso(),
        }
    }

    pub fn context(&self) -> &StudioContext {
        &self.ctx
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub fn chat(&self) -> &ChatSession {
        &self.chat
    }

    pub fn images(&self) -> &ImageGenerationClient {
        &self.images
    }

    pub fn mint(&self) -> Option<&TransactionHandler> {
        self.mint.as_ref()
    }

    pub fn wallet_address(&self) -> Option<&str> {
        self.wallet.address()
    }

    pub fn is_wallet_connected(&self) -> bool {
        self.wallet.address().is_some()
    }

    pub fn connect_wallet(&mut self, preferred: Option<&str>) -> Result<String, StudioError> {
        match self.wallet.connect(preferred) {
            Ok(address) => {
                self.ctx.emit(
                    "wallet_connected",
                    json!({ "wallet": self.wallet.name(), "address": address }),
                );
                self.ctx.notify(
                    Notice::success("Wallet connected")
                        .with_description(abbreviate_address(&address)),
                );
                Ok(address)
            }
            Err(err) => {
                self.ctx.notify(
                    Notice::error("Wallet connection failed").with_description(err.to_string()),
                );
                Err(err.into())
            }
        }
    }

    pub fn disconnect_wallet(&mut self) {
        if self.wallet.address().is_none() {
            return;
        }
        self.wallet.disconnect();
        self.ctx.emit("wallet_disconnected", json!({}));
        self.ctx.notify(Notice::info("Wallet disconnected"));
    }

    /// Runs one create turn: image first, then the (annotated) prompt through chat.
    pub fn submit_prompt(&mut self, prompt: &str) -> Result<PromptOutcome, StudioError> {
        if !self.is_wallet_connected() {
            self.ctx.notify(
                Notice::error("Connect your wallet to start creating")
                    .with_description("Use /connect to link a wallet"),
            );
            return Err(StudioError::WalletNotConnected);
        }
        let prompt = prompt.trim();
        if prompt.is_empty() {
            self.ctx.notify(
                Notice::error("Please enter a description for your NFT")
                    .with_description("Be specific about style, mood, colors, and composition."),
            );
            return Err(StudioError::EmptyPrompt);
        }

        self.ctx.emit("prompt_submitted", json!({ "prompt": prompt }));
        let image = self.generate_image(prompt);
        let sent_text = match image.image.as_ref() {
            Some(generated) if image.success => annotate_prompt(prompt, generated),
            _ => prompt.to_string(),
        };

        self.ctx.notify(
            Notice::success("Sending your creative prompt...")
                .with_description("The AI is processing your request to generate your NFT."),
        );
        let turn = self.chat.send(&sent_text)?;

        let mint_ready = self.open_pending_mint();
        Ok(PromptOutcome {
            image,
            sent_text,
            turn,
            mint_ready,
        })
    }

    pub fn generate_image(&mut self, prompt: &str) -> ImageGenerationOutcome {
        let outcome = self.images.generate(prompt, None, None);
        if outcome.success {
            self.images_generated += 1;
        }
        outcome
    }

    pub fn clear_image(&mut self) {
        self.images.clear();
    }

    pub fn retry_chat(&mut self) -> Result<TurnOutcome, StudioError> {
        let turn = self.chat.retry()?;
        self.open_pending_mint();
        Ok(turn)
    }

    /// Submits the pending mint. The pending slot is released once it lands.
    ///
    /// A failed submission keeps both the handler and the slot so `/retry_mint`
    /// can resubmit the same transaction; `/dismiss` releases them.
    pub fn confirm_mint(&mut self) -> Result<MintState, StudioError> {
        if !self.is_wallet_connected() {
            return Err(WalletError::NotConnected.into());
        }
        let handler = self.mint.as_mut().ok_or(StudioError::NoPendingTransaction)?;
        let submitted = matches!(handler.state(), MintState::Ready);
        let ctx = &self.ctx;
        let state = handler
            .confirm(
                self.wallet.as_ref(),
                |hash| {
                    ctx.notify(
                        Notice::success("NFT minted successfully!").with_description(format!(
                            "Your NFT has been minted. Hash: {}",
                            abbreviate_address(hash)
                        )),
                    )
                },
                |reason| {
                    ctx.notify(
                        Notice::error(format!("Minting failed: {reason}"))
                            .with_description("Use /retry_mint to try again"),
                    )
                },
            )
            .clone();

        // Only a submission made by this call is recorded; a settled handler
        // just reports its state again.
        if let (true, MintState::Success { hash, explorer_url }) = (submitted, &state) {
            let transaction = handler.transaction();
            self.minted.push(map_object(json!({
                "hash": hash,
                "explorer_url": explorer_url,
                "name": transaction.nft_name(),
                "description": transaction.nft_description(),
                "ts": now_utc_iso(),
            })));
            self.ctx.notify(
                Notice::info("View on explorer").with_description(explorer_url.clone()),
            );
            self.chat.clear_pending();
        }
        Ok(state)
    }

    pub fn retry_mint(&mut self) -> Result<bool, StudioError> {
        let handler = self.mint.as_mut().ok_or(StudioError::NoPendingTransaction)?;
        Ok(handler.retry())
    }

    /// Closes the confirmation step and frees the pending slot.
    pub fn dismiss_mint(&mut self) -> bool {
        let Some(handler) = self.mint.take() else {
            return false;
        };
        self.ctx.emit(
            "mint_dismissed",
            json!({ "state": handler.state().as_str() }),
        );
        self.chat.clear_pending();
        true
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.ctx.events.session_id().to_string(),
            started_at: self.started_at.clone(),
            finished_at: now_utc_iso(),
            total_messages: self.chat.messages().len() as u64,
            total_images: self.images_generated,
            minted: self.minted.clone(),
        }
    }

    pub fn finish(&self, summary_path: &Path) -> Result<SessionSummary> {
        let summary = self.summary();
        let extra = map_object(json!({
            "chat_status": self.chat.status().as_str(),
            "wallet": self.wallet.address(),
        }));
        write_summary(summary_path, &summary, Some(&extra))?;
        self.ctx.emit(
            "session_finished",
            json!({ "summary": summary_path.display().to_string() }),
        );
        Ok(summary)
    }

    /// Opens a confirmation step when the chat holds a pending transaction
    /// and no step is open yet. A settled step is replaced.
    fn open_pending_mint(&mut self) -> bool {
        let Some(pending) = self.chat.pending() else {
            return false;
        };
        let open = self
            .mint
            .as_ref()
            .is_some_and(|handler| !matches!(handler.state(), MintState::Success { .. }));
        if open {
            return false;
        }
        self.mint = Some(TransactionHandler::new(
            pending.clone(),
            self.config.explorer_tx_base.clone(),
            self.ctx.clone(),
        ));
        self.ctx.notify(
            Notice::info("NFT Ready to Mint").with_description(pending.nft_name().to_string()),
        );
        true
    }
}

/// Appends the content address so the model can reference the pinned image.
fn annotate_prompt(prompt: &str, image: &GeneratedImage) -> String {
    format!(
        "{prompt}\n\nGenerated image: {}",
        ipfs_url(&image.ipfs_hash)
    )
}
