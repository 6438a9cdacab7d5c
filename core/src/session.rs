/// AI session controller
///
/// Owns one support conversation: the message log, the ticket-intake
/// context, and the single-flight send discipline. Methods take `&self`
/// and may be called from any task; the pending flag is checked and set
/// under one lock acquisition before the first await, so no race window
/// exists between the guard and the optimistic append.
use crate::gateway::ChatGateway;
use crate::session_store::SessionStore;
use crate::types::{ChatSession, Message};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Synchronous state view handed to the UI layer.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub messages: Vec<Message>,
    pub context: crate::context::ConversationContext,
    pub pending: bool,
    pub last_latency_ms: u64,
    pub recent_errors: Vec<String>,
    /// Session-level error flag: raised on a failed send or a failed
    /// session creation, cleared when the next send starts.
    pub has_error: bool,
}

#[derive(Default)]
struct SessionState {
    session: ChatSession,
    has_error: bool,
    /// Monotonic send counter; a completion whose sequence no longer
    /// matches is stale and must not touch state.
    send_seq: u64,
}

pub struct SessionController {
    state: Arc<Mutex<SessionState>>,
    gateway: Arc<dyn ChatGateway>,
    store: Arc<dyn SessionStore>,
}

impl SessionController {
    pub fn new(gateway: Arc<dyn ChatGateway>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::default())),
            gateway,
            store,
        }
    }

    /// Restore the persisted session or create a fresh one. Fails softly:
    /// when session creation fails the error flag is raised and the
    /// controller stays unusable until `initialize` is called again.
    /// Returns whether the session is ready. Idempotent once ready.
    pub async fn initialize(&self) -> bool {
        {
            let st = self.state.lock().await;
            if st.session.is_ready() {
                return true;
            }
        }

        match self.store.load().await {
            Ok(Some(mut saved)) if saved.is_ready() => {
                // A send never survives a restart
                saved.pending = false;
                let mut st = self.state.lock().await;
                info!("Restored session {}", saved.session_id);
                st.session = saved;
                st.has_error = false;
                return true;
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to load persisted session: {}", e),
        }

        match self.gateway.create_session().await {
            Ok(session_id) => {
                let snapshot = {
                    let mut st = self.state.lock().await;
                    st.session = ChatSession::new(&session_id);
                    st.has_error = false;
                    st.session.clone()
                };
                info!("Created session {}", session_id);
                self.persist(&snapshot).await;
                true
            }
            Err(e) => {
                warn!("Failed to create session: {}", e);
                self.state.lock().await.has_error = true;
                false
            }
        }
    }

    /// Send one user message and reconcile the reply. No-op when the text
    /// trims to empty, a send is already pending, or the session is not
    /// initialized. On failure the optimistic message is marked failed and
    /// the session stays usable; resubmission is always user-initiated.
    pub async fn send_message(&self, text: &str) {
        let text = text.trim().to_string();
        if text.is_empty() {
            return;
        }

        let (user_msg_id, session_id, context, seq, optimistic) = {
            let mut st = self.state.lock().await;
            if !st.session.is_ready() || st.session.pending {
                debug!("send_message ignored: not ready or already pending");
                return;
            }
            let msg = Message::user(&text);
            let id = msg.id.clone();
            st.session.messages.append(msg);
            st.session.pending = true;
            st.has_error = false;
            st.send_seq += 1;
            (
                id,
                st.session.session_id.clone(),
                st.session.context.clone(),
                st.send_seq,
                st.session.clone(),
            )
        };
        self.persist(&optimistic).await;

        let started = Instant::now();
        let result = self
            .gateway
            .send_ai_message(&session_id, &text, &context)
            .await;

        let snapshot = {
            let mut st = self.state.lock().await;
            if st.send_seq != seq {
                debug!("Discarding stale send result for session {}", session_id);
                return;
            }
            match result {
                Ok(reply) => {
                    st.session.messages.append(Message::assistant(reply.reply));
                    st.session.context.apply_snapshot(reply.context);
                    st.session.pending = false;
                    st.session.last_latency_ms = reply
                        .latency_ms
                        .unwrap_or(started.elapsed().as_millis() as u64);
                    st.session.recent_errors.clear();
                }
                Err(e) if e.is_cancelled() => {
                    // Superseded request: drop the result, free the slot
                    debug!("AI send superseded, dropping result");
                    st.session.pending = false;
                }
                Err(e) => {
                    warn!("Failed to send message: {}", e);
                    st.session.messages.mark_error(&user_msg_id);
                    st.session.pending = false;
                    st.session.recent_errors.push(e.to_string());
                    st.has_error = true;
                }
            }
            st.session.clone()
        };
        self.persist(&snapshot).await;
    }

    /// Resend the text of the newest failed user message as a brand-new
    /// message. The failed entry keeps its place in history. No-op when
    /// nothing failed.
    pub async fn retry_last_message(&self) {
        let text = {
            let st = self.state.lock().await;
            st.session
                .messages
                .last_failed_from_user()
                .map(|m| m.text.clone())
        };
        if let Some(text) = text {
            self.send_message(&text).await;
        }
    }

    /// Explicit session destruction: drop persisted and in-memory state
    /// back to uninitialized. The sequence bump invalidates any in-flight
    /// send so its completion cannot touch the fresh state.
    pub async fn reset(&self) {
        if let Err(e) = self.store.clear().await {
            warn!("Failed to clear persisted session: {}", e);
        }
        let mut st = self.state.lock().await;
        st.session = ChatSession::default();
        st.has_error = false;
        st.send_seq += 1;
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let st = self.state.lock().await;
        SessionSnapshot {
            session_id: st.session.session_id.clone(),
            messages: st.session.messages.messages().to_vec(),
            context: st.session.context.clone(),
            pending: st.session.pending,
            last_latency_ms: st.session.last_latency_ms,
            recent_errors: st.session.recent_errors.clone(),
            has_error: st.has_error,
        }
    }

    pub async fn is_ready(&self) -> bool {
        self.state.lock().await.session.is_ready()
    }

    /// Best-effort persistence after every mutation; failures are logged,
    /// never surfaced to the caller.
    async fn persist(&self, session: &ChatSession) {
        if let Err(e) = self.store.save(session).await {
            warn!("Failed to persist session: {}", e);
        }
    }
}

impl Clone for SessionController {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            gateway: self.gateway.clone(),
            store: self.store.clone(),
        }
    }
}
