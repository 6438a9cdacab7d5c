/// Polling sync controller for channel and direct conversations
///
/// Approximates real-time delivery without a persistent connection: a
/// fixed-interval loop fetches the authoritative message snapshot and
/// fully replaces local state with it. Locally-authored messages are
/// echoed optimistically and reconciled against the next snapshot; the
/// server copy is always the ground truth, so an echo may momentarily
/// disappear until a fetch re-includes it.
use crate::gateway::ChannelGateway;
use crate::message_log::MessageLog;
use crate::types::{ChannelRecord, Message, MessageRole};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Which conversation the controller is synchronizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncTarget {
    Channel { channel_key: String },
    Direct { peer_id: String },
}

/// State view for the UI layer.
#[derive(Debug, Clone)]
pub struct SyncSnapshot {
    pub messages: Vec<Message>,
    pub pending: bool,
    /// True until the first fetch attempt for the current target settles.
    pub loading: bool,
}

/// Full-replace merge: map an authoritative snapshot into local messages,
/// deriving each role by comparing the sender against the local user.
/// Pure function; the role is computed here and never persisted, so it
/// stays correct if the local identity ever changes.
pub fn reconcile_snapshot(records: Vec<ChannelRecord>, local_user_id: &str) -> Vec<Message> {
    records
        .into_iter()
        .map(|r| Message {
            role: if r.sender_id == local_user_id {
                MessageRole::User
            } else {
                MessageRole::Assistant
            },
            id: r.id,
            text: r.text,
            created_at: r.created_at,
            error: false,
            sender_id: Some(r.sender_id),
            sender_name: Some(r.sender_name),
        })
        .collect()
}

struct SyncState {
    target: Option<SyncTarget>,
    messages: MessageLog,
    pending: bool,
    loading: bool,
    /// Handle of the running polling loop, if any.
    poll_token: Option<CancellationToken>,
}

pub struct SyncController {
    state: Arc<Mutex<SyncState>>,
    gateway: Arc<dyn ChannelGateway>,
    user_id: String,
    user_name: String,
    poll_interval: Duration,
}

impl SyncController {
    pub fn new(
        gateway: Arc<dyn ChannelGateway>,
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(SyncState {
                target: None,
                messages: MessageLog::new(),
                pending: false,
                loading: false,
                poll_token: None,
            })),
            gateway,
            user_id: user_id.into(),
            user_name: user_name.into(),
            poll_interval,
        }
    }

    /// Select a conversation and start polling it. Any previous loop is
    /// cancelled first; its late results are discarded by the apply-time
    /// target guard.
    pub async fn start(&self, target: SyncTarget) {
        let token = CancellationToken::new();
        {
            let mut st = self.state.lock().await;
            if let Some(prev) = st.poll_token.take() {
                prev.cancel();
            }
            st.target = Some(target.clone());
            st.messages.clear();
            st.pending = false;
            st.loading = true;
            st.poll_token = Some(token.clone());
        }

        let controller = self.clone();
        let period = self.poll_interval;
        tokio::spawn(async move {
            // First tick fires immediately: fetch on activation, then on
            // every period.
            let mut ticker = interval(period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => controller.refresh(&target).await,
                }
            }
            debug!("Polling stopped for {:?}", target);
        });
    }

    /// Stop polling and deselect the conversation. Must run on teardown
    /// and on selection change so no interval outlives its view.
    pub async fn stop(&self) {
        let mut st = self.state.lock().await;
        if let Some(token) = st.poll_token.take() {
            token.cancel();
        }
        st.target = None;
        st.pending = false;
    }

    /// Fetch the current target's snapshot immediately, bypassing the
    /// poll timer.
    pub async fn refresh_now(&self) {
        let target = self.state.lock().await.target.clone();
        if let Some(target) = target {
            self.refresh(&target).await;
        }
    }

    /// Send one message with an optimistic local echo. No-op when the text
    /// trims to empty, a send is already pending, or no conversation is
    /// selected. Success triggers an immediate snapshot refresh; failure
    /// marks the echo failed and leaves it in place until a later
    /// full-replace naturally drops it or the user retries.
    pub async fn send_message(&self, text: &str) {
        let text = text.trim().to_string();
        if text.is_empty() || self.user_id.is_empty() {
            return;
        }

        let (msg_id, target) = {
            let mut st = self.state.lock().await;
            let Some(target) = st.target.clone() else {
                return;
            };
            if st.pending {
                debug!("send_message ignored: send already pending");
                return;
            }
            let msg = Message::outgoing(&text, &self.user_id, &self.user_name);
            let id = msg.id.clone();
            st.messages.append(msg);
            st.pending = true;
            (id, target)
        };

        let result = match &target {
            SyncTarget::Channel { channel_key } => {
                self.gateway
                    .send_channel_message(channel_key, &self.user_id, &self.user_name, &text)
                    .await
            }
            SyncTarget::Direct { peer_id } => {
                self.gateway
                    .send_direct_message(&self.user_id, peer_id, &self.user_name, &text)
                    .await
            }
        };

        match result {
            Ok(()) => {
                // Pull the authoritative copy right away instead of
                // waiting for the next tick
                self.refresh(&target).await;
                let mut st = self.state.lock().await;
                if st.target.as_ref() == Some(&target) {
                    st.pending = false;
                }
            }
            Err(e) => {
                warn!("Failed to send message: {}", e);
                let mut st = self.state.lock().await;
                if st.target.as_ref() == Some(&target) {
                    st.messages.mark_error(&msg_id);
                    st.pending = false;
                }
            }
        }
    }

    /// Resend the newest failed locally-authored message as a new entry.
    pub async fn retry_last_message(&self) {
        let text = {
            let st = self.state.lock().await;
            st.messages.last_failed_from_user().map(|m| m.text.clone())
        };
        if let Some(text) = text {
            self.send_message(&text).await;
        }
    }

    pub async fn snapshot(&self) -> SyncSnapshot {
        let st = self.state.lock().await;
        SyncSnapshot {
            messages: st.messages.messages().to_vec(),
            pending: st.pending,
            loading: st.loading,
        }
    }

    async fn refresh(&self, target: &SyncTarget) {
        let result = match target {
            SyncTarget::Channel { channel_key } => {
                self.gateway.fetch_channel_messages(channel_key).await
            }
            SyncTarget::Direct { peer_id } => {
                self.gateway
                    .fetch_direct_messages(&self.user_id, peer_id)
                    .await
            }
        };

        let mut st = self.state.lock().await;
        // Apply-time guard: a snapshot fetched for a torn-down or switched
        // target must never overwrite current state
        if st.target.as_ref() != Some(target) {
            debug!("Discarding snapshot for inactive target {:?}", target);
            return;
        }
        match result {
            Ok(records) => {
                st.messages
                    .replace_all(reconcile_snapshot(records, &self.user_id));
                st.loading = false;
            }
            Err(e) => {
                // Keep local state; the next tick will try again
                warn!("Failed to fetch messages for {:?}: {}", target, e);
                st.loading = false;
            }
        }
    }
}

impl Clone for SyncController {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            gateway: self.gateway.clone(),
            user_id: self.user_id.clone(),
            user_name: self.user_name.clone(),
            poll_interval: self.poll_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, sender: &str, text: &str) -> ChannelRecord {
        ChannelRecord {
            id: id.to_string(),
            sender_id: sender.to_string(),
            sender_name: format!("name-{}", sender),
            text: text.to_string(),
            created_at: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_reconcile_derives_roles() {
        let records = vec![record("1", "alice", "hi"), record("2", "bob", "hey")];
        let messages = reconcile_snapshot(records, "alice");

        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[1].sender_name.as_deref(), Some("name-bob"));
    }

    #[test]
    fn test_reconcile_is_full_replace_shape() {
        let messages = reconcile_snapshot(vec![], "alice");
        assert!(messages.is_empty());

        let messages = reconcile_snapshot(vec![record("9", "bob", "only")], "alice");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "9");
        assert!(!messages[0].error);
    }
}
