/// Chatlink - client-side conversation engine
///
/// Session management for an AI-backed support chat plus polling sync for
/// group and direct conversations: optimistic local mutation, reconciliation
/// with asynchronous server responses, retry-on-failure, and a multi-turn
/// ticket-intake state machine.

pub mod config;
pub mod context;
pub mod error;
pub mod gateway;
pub mod message_log;
pub mod polling;
pub mod session;
pub mod session_store;
pub mod types;

pub use config::ClientConfig;
pub use context::{ConversationContext, ConversationState, Urgency};
pub use error::{ChatError, Result};
pub use gateway::{ChannelGateway, ChatGateway, HttpGateway};
pub use message_log::MessageLog;
pub use polling::{SyncController, SyncTarget};
pub use session::SessionController;
pub use session_store::{SessionStore, SledSessionStore};
pub use types::{ChatSession, Message, MessageRole};
