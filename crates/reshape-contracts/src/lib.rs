//! Data contracts shared by the Reshape engine and CLI: chat messages and
//! their wire codec, the mint payload detector, image/upload bodies, the MCP
//! tool catalog, and the JSONL event log.

pub mod chat;
pub mod events;
pub mod images;
pub mod mint;
pub mod summary;
pub mod tools;
