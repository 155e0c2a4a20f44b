use reshape_contracts::mint::PendingTransaction;
use serde_json::json;

use crate::config::explorer_link;
use crate::context::StudioContext;
use crate::wallet::{abbreviate_address, Wallet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MintState {
    Ready,
    Success { hash: String, explorer_url: String },
    Failed { reason: String },
}

impl MintState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Success { .. } => "success",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Confirmation step for one pending transaction.
pub struct TransactionHandler {
    pending: PendingTransaction,
    explorer_tx_base: String,
    ctx: StudioContext,
    state: MintState,
}

impl TransactionHandler {
    pub fn new(
        pending: PendingTransaction,
        explorer_tx_base: impl Into<String>,
        ctx: StudioContext,
    ) -> Self {
        Self {
            pending,
            explorer_tx_base: explorer_tx_base.into(),
            ctx,
            state: MintState::Ready,
        }
    }

    pub fn state(&self) -> &MintState {
        &self.state
    }

    pub fn transaction(&self) -> &PendingTransaction {
        &self.pending
    }

    /// Submits through `wallet`. Only acts from `Ready`; any other state is returned unchanged.
    pub fn confirm<C, E>(&mut self, wallet: &dyn Wallet, on_complete: C, on_error: E) -> &MintState
    where
        C: FnOnce(&str),
        E: FnOnce(&str),
    {
        if self.state != MintState::Ready {
            return &self.state;
        }

        self.ctx.emit(
            "mint_submitted",
            json!({
                "wallet": wallet.name(),
                "name": self.pending.nft_name(),
                "to": self.pending.transaction.to,
            }),
        );
        match wallet.send_transaction(&self.pending.transaction) {
            Ok(hash) => {
                let explorer_url = explorer_link(&self.explorer_tx_base, &hash);
                self.ctx.emit(
                    "mint_confirmed",
                    json!({
                        "hash": hash,
                        "explorer_url": explorer_url,
                        "name": self.pending.nft_name(),
                    }),
                );
                on_complete(&hash);
                self.state = MintState::Success { hash, explorer_url };
            }
            Err(err) => {
                let reason = err.to_string();
                tracing::warn!(reason = %reason, "mint submission failed");
                self.ctx.emit("mint_failed", json!({ "error": reason }));
                on_error(&reason);
                self.state = MintState::Failed { reason };
            }
        }
        &self.state
    }

    /// Moves a failed mint back to `Ready`. Returns whether anything changed.
    pub fn retry(&mut self) -> bool {
        if !matches!(self.state, MintState::Failed { .. }) {
            return false;
        }
        self.state = MintState::Ready;
        self.ctx.emit("mint_retry", json!({}));
        true
    }

    pub fn render_lines(&self) -> Vec<String> {
        match &self.state {
            MintState::Ready => {
                let mut lines = vec![
                    "NFT Ready to Mint".to_string(),
                    format!("Name: {}", self.pending.nft_name()),
                    format!("Description: {}", self.pending.nft_description()),
                ];
                if let Some(to) = self.pending.transaction.to.as_deref() {
                    lines.push(format!("Contract: {}", abbreviate_address(to)));
                }
                if let Some(recipient) = self.pending.recipient() {
                    lines.push(format!("Recipient: {}", abbreviate_address(recipient)));
                }
                lines
            }
            MintState::Success { hash, explorer_url } => vec![
                "NFT Minted Successfully!".to_string(),
                format!("Transaction: {}", abbreviate_address(hash)),
                format!("View on explorer: {explorer_url}"),
            ],
            MintState::Failed { reason } => vec![
                "Minting Failed".to_string(),
                reason.clone(),
            ],
        }
    }
}
