/// Ordered in-memory message store for one conversation
///
/// Append-only apart from the error flag and the full-replace merge used by
/// the polling controllers. No persistence here; sessions serialize the
/// whole log as part of their snapshot.
use crate::types::{Message, MessageRole};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append preserving insertion order. A message whose id is already
    /// present is dropped; ids are unique within one log.
    pub fn append(&mut self, msg: Message) {
        if self.messages.iter().any(|m| m.id == msg.id) {
            warn!("Dropping message with duplicate id {}", msg.id);
            return;
        }
        self.messages.push(msg);
    }

    /// Flip the error flag on the message with the given id. No-op when
    /// the id is absent. Returns whether a message was marked.
    pub fn mark_error(&mut self, id: &str) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(msg) => {
                msg.error = true;
                true
            }
            None => false,
        }
    }

    /// Most recent locally-authored message that failed to send, scanning
    /// from the newest end.
    pub fn last_failed_from_user(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User && m.error)
    }

    /// Replace the whole log with an authoritative snapshot.
    pub fn replace_all(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_order() {
        let mut log = MessageLog::new();
        log.append(Message::user("first"));
        log.append(Message::assistant("second"));
        log.append(Message::user("third"));

        let texts: Vec<_> = log.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["first", "second", "third"]);
    }

    #[test]
    fn test_duplicate_id_is_dropped() {
        let mut log = MessageLog::new();
        let msg = Message::user("hello");
        log.append(msg.clone());
        log.append(msg);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_mark_error() {
        let mut log = MessageLog::new();
        let msg = Message::user("will fail");
        let id = msg.id.clone();
        log.append(msg);

        assert!(log.mark_error(&id));
        assert!(log.messages()[0].error);
        assert!(!log.mark_error("no-such-id"));
    }

    #[test]
    fn test_last_failed_from_user() {
        let mut log = MessageLog::new();
        let first = Message::user("first failure");
        let second = Message::user("second failure");
        let first_id = first.id.clone();
        let second_id = second.id.clone();
        log.append(first);
        log.append(Message::assistant("reply"));
        log.append(second);
        log.mark_error(&first_id);
        log.mark_error(&second_id);

        let found = log.last_failed_from_user().unwrap();
        assert_eq!(found.id, second_id);
    }

    #[test]
    fn test_last_failed_ignores_assistant_errors() {
        let mut log = MessageLog::new();
        let reply = Message::assistant("reply");
        let id = reply.id.clone();
        log.append(reply);
        log.mark_error(&id);

        assert!(log.last_failed_from_user().is_none());
    }
}
