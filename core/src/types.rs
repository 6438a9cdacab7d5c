/// Shared types for the chat engine
use crate::context::ConversationContext;
use crate::message_log::MessageLog;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a message, from the local user's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One chat message. Identity is `id`; immutable after creation except for
/// the `error` flag, which the originating controller may set after a
/// failed send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub text: String,
    /// Unix epoch milliseconds
    pub created_at: i64,
    #[serde(default)]
    pub error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
}

impl Message {
    /// Locally-authored user message with a fresh identity.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, text)
    }

    /// Assistant message (welcome text or a server reply).
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, text)
    }

    /// Optimistic echo for a channel/direct send, tagged with the sender.
    pub fn outgoing(
        text: impl Into<String>,
        sender_id: impl Into<String>,
        sender_name: impl Into<String>,
    ) -> Self {
        let mut msg = Self::new(MessageRole::User, text);
        msg.sender_id = Some(sender_id.into());
        msg.sender_name = Some(sender_name.into());
        msg
    }

    fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            text: text.into(),
            created_at: now_millis(),
            error: false,
            sender_id: None,
            sender_name: None,
        }
    }
}

/// Current time as unix epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// One AI-backed support conversation, as persisted and as exposed to the
/// UI layer. At most one `pending=true` send exists per session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub session_id: String,
    pub messages: MessageLog,
    pub context: ConversationContext,
    #[serde(default)]
    pub pending: bool,
    #[serde(default)]
    pub last_latency_ms: u64,
    #[serde(default)]
    pub recent_errors: Vec<String>,
}

impl ChatSession {
    /// Fresh session seeded with the welcome message and a greeting context.
    pub fn new(session_id: impl Into<String>) -> Self {
        let mut messages = MessageLog::new();
        messages.append(Message::assistant(WELCOME_TEXT));
        Self {
            session_id: session_id.into(),
            messages,
            context: ConversationContext::default(),
            pending: false,
            last_latency_ms: 0,
            recent_errors: Vec::new(),
        }
    }

    /// A session is usable once it carries a server-issued id.
    pub fn is_ready(&self) -> bool {
        !self.session_id.is_empty()
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new("")
    }
}

/// Fixed first message of every new session.
pub const WELCOME_TEXT: &str =
    "Hi! I'm your support assistant. What product can I help you with today?";

/// Successful AI exchange: reply text plus the next context snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
    pub context: ConversationContext,
    /// Server-reported latency; when absent the controller falls back to
    /// wall-clock elapsed time.
    pub latency_ms: Option<u64>,
}

/// Message record as the backend returns it for channel and direct
/// conversations. The local role is derived at merge time by comparing
/// `sender_id` against the local user id, never stored on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub text: String,
    pub created_at: i64,
}
