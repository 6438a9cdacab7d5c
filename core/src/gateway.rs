/// Transport gateway — backend contracts and their HTTP implementation
///
/// The controllers only ever see the two traits; `HttpGateway` talks JSON
/// to the support backend over reqwest. The AI send channel is single-
/// flight: issuing a new send takes ownership of the cancellation slot and
/// cancels whatever request was still in flight, so at most one request
/// per session is ever outstanding.
use crate::config::ClientConfig;
use crate::context::ConversationContext;
use crate::error::{ChatError, Result};
use crate::types::{ChannelRecord, ChatReply};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// AI session transport.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Request a new session id. Fails with `Connection` when the backend
    /// is unreachable.
    async fn create_session(&self) -> Result<String>;

    /// One AI exchange. Fails with `RequestFailed` on a server error and
    /// `Cancelled` when a newer send superseded this one.
    async fn send_ai_message(
        &self,
        session_id: &str,
        text: &str,
        context: &ConversationContext,
    ) -> Result<ChatReply>;
}

/// Channel and direct-message transport.
#[async_trait]
pub trait ChannelGateway: Send + Sync {
    async fn fetch_channel_messages(&self, channel_key: &str) -> Result<Vec<ChannelRecord>>;

    async fn send_channel_message(
        &self,
        channel_key: &str,
        sender_id: &str,
        sender_name: &str,
        text: &str,
    ) -> Result<()>;

    async fn fetch_direct_messages(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Vec<ChannelRecord>>;

    async fn send_direct_message(
        &self,
        from_id: &str,
        to_id: &str,
        from_name: &str,
        text: &str,
    ) -> Result<()>;
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionResponse {
    session_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AiMessageRequest<'a> {
    session_id: &'a str,
    message: &'a str,
    context: &'a ConversationContext,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AiMessageResponse {
    reply: String,
    context: ConversationContext,
    latency_ms: Option<u64>,
}

#[derive(Deserialize)]
struct MessageListResponse {
    messages: Vec<WireMessage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    id: String,
    user_id: String,
    user_name: String,
    text: String,
    timestamp: i64,
}

impl From<WireMessage> for ChannelRecord {
    fn from(m: WireMessage) -> Self {
        ChannelRecord {
            id: m.id,
            sender_id: m.user_id,
            sender_name: m.user_name,
            text: m.text,
            created_at: m.timestamp,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChannelSendRequest<'a> {
    channel_id: &'a str,
    user_id: &'a str,
    user_name: &'a str,
    message: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DirectSendRequest<'a> {
    from_user_id: &'a str,
    to_user_id: &'a str,
    from_user_name: &'a str,
    message: &'a str,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: String,
}

// ─── HTTP implementation ─────────────────────────────────────────────────────

pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    /// Cancellation handle of the in-flight AI send, if any.
    ai_send_slot: Mutex<Option<CancellationToken>>,
}

impl HttpGateway {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ChatError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            ai_send_slot: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Swap a fresh token into the single-flight slot, cancelling the
    /// previous in-flight send.
    fn take_ai_send_slot(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let previous = self
            .ai_send_slot
            .lock()
            .expect("ai send slot poisoned")
            .replace(token.clone());
        if let Some(prev) = previous {
            debug!("Cancelling superseded AI send");
            prev.cancel();
        }
        token
    }

    fn map_transport_error(e: reqwest::Error) -> ChatError {
        if e.is_connect() {
            ChatError::Connection(format!("Cannot reach backend: {}", e))
        } else if e.is_timeout() {
            ChatError::RequestFailed(format!("Request timed out: {}", e))
        } else {
            ChatError::RequestFailed(e.to_string())
        }
    }

    async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        // Prefer the backend's own error message when it sends one
        let detail = match response.json::<ApiErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => format!("server returned {}", status),
        };
        Err(ChatError::RequestFailed(detail))
    }
}

#[async_trait]
impl ChatGateway for HttpGateway {
    async fn create_session(&self) -> Result<String> {
        let response = self
            .client
            .post(self.url("/api/chat/session"))
            .send()
            .await
            .map_err(|e| ChatError::Connection(format!("Cannot reach backend: {}", e)))?;

        let body: CreateSessionResponse = Self::expect_success(response)
            .await?
            .json()
            .await
            .map_err(|e| ChatError::RequestFailed(format!("invalid session response: {}", e)))?;

        Ok(body.session_id)
    }

    async fn send_ai_message(
        &self,
        session_id: &str,
        text: &str,
        context: &ConversationContext,
    ) -> Result<ChatReply> {
        let token = self.take_ai_send_slot();

        let request = self
            .client
            .post(self.url("/api/chat/message"))
            .json(&AiMessageRequest {
                session_id,
                message: text,
                context,
            })
            .send();

        let response = tokio::select! {
            _ = token.cancelled() => return Err(ChatError::Cancelled),
            result = request => result.map_err(Self::map_transport_error)?,
        };

        let body: AiMessageResponse = Self::expect_success(response)
            .await?
            .json()
            .await
            .map_err(|e| ChatError::RequestFailed(format!("invalid chat response: {}", e)))?;

        Ok(ChatReply {
            reply: body.reply,
            context: body.context,
            latency_ms: body.latency_ms,
        })
    }
}

#[async_trait]
impl ChannelGateway for HttpGateway {
    async fn fetch_channel_messages(&self, channel_key: &str) -> Result<Vec<ChannelRecord>> {
        let response = self
            .client
            .get(self.url(&format!("/api/group-chat/messages/{}", channel_key)))
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let body: MessageListResponse = Self::expect_success(response)
            .await?
            .json()
            .await
            .map_err(|e| ChatError::RequestFailed(format!("invalid message list: {}", e)))?;

        Ok(body.messages.into_iter().map(Into::into).collect())
    }

    async fn send_channel_message(
        &self,
        channel_key: &str,
        sender_id: &str,
        sender_name: &str,
        text: &str,
    ) -> Result<()> {
        let response = self
            .client
            .post(self.url("/api/group-chat/messages"))
            .json(&ChannelSendRequest {
                channel_id: channel_key,
                user_id: sender_id,
                user_name: sender_name,
                message: text,
            })
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        Self::expect_success(response).await?;
        Ok(())
    }

    async fn fetch_direct_messages(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Vec<ChannelRecord>> {
        let response = self
            .client
            .get(self.url(&format!(
                "/api/direct-messages/conversation/{}/{}",
                user_a, user_b
            )))
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let body: MessageListResponse = Self::expect_success(response)
            .await?
            .json()
            .await
            .map_err(|e| ChatError::RequestFailed(format!("invalid message list: {}", e)))?;

        Ok(body.messages.into_iter().map(Into::into).collect())
    }

    async fn send_direct_message(
        &self,
        from_id: &str,
        to_id: &str,
        from_name: &str,
        text: &str,
    ) -> Result<()> {
        let response = self
            .client
            .post(self.url("/api/direct-messages/send"))
            .json(&DirectSendRequest {
                from_user_id: from_id,
                to_user_id: to_id,
                from_user_name: from_name,
                message: text,
            })
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        Self::expect_success(response).await?;
        Ok(())
    }
}
