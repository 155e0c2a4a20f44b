pub mod detector;
mod payload;

pub use detector::{detect_in_text, detect_pending_transaction};
pub use payload::{ChainCall, MintMetadata, PendingTransaction, MINT_FUNCTION_NAME, MINT_TOOL_NAME};
