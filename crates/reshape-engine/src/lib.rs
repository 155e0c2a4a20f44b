//! Orchestration for the create flow: image generation, chat turns, and mint confirmation.

pub mod chat;
pub mod config;
pub mod context;
pub mod error;
mod http;
pub mod images;
pub mod mint;
pub mod studio;
pub mod upload;
pub mod wallet;

#[cfg(test)]
pub(crate) mod testing;

pub use chat::{ChatSession, ChatStatus, ChatTransport, HttpChatTransport, TurnOutcome};
pub use config::StudioConfig;
pub use context::{Notice, NoticeLevel, NoticeLog, Notifier, StudioContext};
pub use error::StudioError;
pub use images::{
    DryrunImageEndpoint, GeneratingFlag, HttpImageEndpoint, ImageEndpoint,
    ImageGenerationClient, ImageGenerationOutcome,
};
pub use mint::{MintState, TransactionHandler};
pub use studio::{PromptOutcome, Studio, StudioBackends};
pub use upload::UploadClient;
pub use wallet::{abbreviate_address, DryrunWallet, JsonRpcWallet, Wallet, WalletError};
