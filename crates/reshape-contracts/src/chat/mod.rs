mod command_registry;
mod intent_parser;
pub mod message;
pub mod stream;

pub use command_registry::CHAT_HELP_COMMANDS;
pub use intent_parser::{parse_intent, Intent};
pub use message::{ChatMessage, MessagePart, Role, ToolCallPart, ToolState};
pub use stream::{StreamDecoder, StreamFormat, StreamFragment, TurnAssembler};
