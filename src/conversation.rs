//! Conversation history: messages and the append-only log that holds them

mod log;
mod message;

pub use log::{LogError, MessageLog};
pub use message::{Message, MessageContent, MessageDraft, Role};
