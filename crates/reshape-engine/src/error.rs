use crate::wallet::WalletError;

#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    #[error("Prompt is required")]
    EmptyPrompt,
    #[error("connect a wallet to start creating")]
    WalletNotConnected,
    #[error("chat request failed: {0}")]
    Chat(String),
    #[error("the last chat turn did not fail; nothing to retry")]
    NothingToRetry,
    #[error("no transaction is waiting for confirmation")]
    NoPendingTransaction,
    #[error(transparent)]
    Wallet(#[from] WalletError),
}
