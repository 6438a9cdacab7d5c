/// Session persistence: one snapshot stored in sled
/// Frugal: single key-value entry, no history
use crate::error::{ChatError, Result};
use crate::types::ChatSession;
use async_trait::async_trait;
use std::path::Path;

const SESSION_KEY: &[u8] = b"session";

/// Opaque load/save collaborator for the persisted session. Controllers
/// treat every failure as best-effort: logged, never surfaced.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Option<ChatSession>>;
    async fn save(&self, session: &ChatSession) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

pub struct SledSessionStore {
    db: sled::Db,
}

impl SledSessionStore {
    pub fn new(data_dir: &Path) -> Result<Self> {
        let db = sled::open(data_dir.join("session.db"))
            .map_err(|e| ChatError::Storage(format!("session DB: {}", e)))?;
        Ok(Self { db })
    }
}

#[async_trait]
impl SessionStore for SledSessionStore {
    async fn load(&self) -> Result<Option<ChatSession>> {
        match self
            .db
            .get(SESSION_KEY)
            .map_err(|e| ChatError::Storage(format!("load session: {}", e)))?
        {
            Some(val) => {
                let session = serde_json::from_slice(&val).map_err(ChatError::Serialization)?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, session: &ChatSession) -> Result<()> {
        let val = serde_json::to_vec(session).map_err(ChatError::Serialization)?;
        self.db
            .insert(SESSION_KEY, val)
            .map_err(|e| ChatError::Storage(format!("save session: {}", e)))?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.db
            .remove(SESSION_KEY)
            .map_err(|e| ChatError::Storage(format!("clear session: {}", e)))?;
        Ok(())
    }
}

impl Clone for SledSessionStore {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = SledSessionStore::new(temp_dir.path()).unwrap();

        let mut session = ChatSession::new("sess-1");
        session.messages.append(Message::user("My app crashes"));
        session.last_latency_ms = 245;
        store.save(&session).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.session_id, "sess-1");
        assert_eq!(loaded.messages.len(), session.messages.len());
        assert_eq!(loaded.context, session.context);
        assert_eq!(loaded.last_latency_ms, 245);
    }

    #[tokio::test]
    async fn test_load_empty_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = SledSessionStore::new(temp_dir.path()).unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_removes_session() {
        let temp_dir = TempDir::new().unwrap();
        let store = SledSessionStore::new(temp_dir.path()).unwrap();

        store.save(&ChatSession::new("sess-2")).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }
}
