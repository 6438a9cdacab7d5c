/// Ticket-intake context machine
///
/// The backend drives all transitions: every AI exchange returns the next
/// full context snapshot. The client's only job is to refuse a snapshot
/// that would move the intake state backward, which protects the flow from
/// out-of-order or duplicate responses.
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Intake progress. Variant order defines the progression order:
/// a snapshot may only keep or advance the state, never regress it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    Greeting,
    CollectingProduct,
    CollectingIssue,
    CollectingUrgency,
    Confirming,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

/// Structured ticket-intake state attached to a session. Fields fill in
/// monotonically as the conversation progresses; only a fresh session
/// clears them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    pub product: Option<String>,
    pub issue: Option<String>,
    pub urgency: Option<Urgency>,
    pub ticket_id: Option<String>,
    pub state: ConversationState,
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self {
            product: None,
            issue: None,
            urgency: None,
            ticket_id: None,
            state: ConversationState::Greeting,
        }
    }
}

impl ConversationContext {
    /// Adopt a server-supplied snapshot unless it would regress the intake
    /// state. Returns whether the snapshot was applied. `Complete` is
    /// terminal: later snapshots are still adopted (the ticket id may be
    /// refined) but the ordering rule keeps the state at `Complete`.
    pub fn apply_snapshot(&mut self, next: ConversationContext) -> bool {
        if next.state < self.state {
            warn!(
                "Ignoring context snapshot regressing {:?} -> {:?}",
                self.state, next.state
            );
            return false;
        }
        *self = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(state: ConversationState) -> ConversationContext {
        ConversationContext {
            state,
            ..Default::default()
        }
    }

    #[test]
    fn test_state_ordering() {
        use ConversationState::*;
        let order = [
            Greeting,
            CollectingProduct,
            CollectingIssue,
            CollectingUrgency,
            Confirming,
            Complete,
        ];
        for pair in order.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_adopts_forward_snapshot() {
        let mut ctx = ConversationContext::default();
        let mut next = at(ConversationState::CollectingIssue);
        next.product = Some("Router X1".to_string());

        assert!(ctx.apply_snapshot(next.clone()));
        assert_eq!(ctx, next);
    }

    #[test]
    fn test_rejects_backward_snapshot() {
        let mut ctx = at(ConversationState::Confirming);
        ctx.product = Some("Router X1".to_string());
        let before = ctx.clone();

        assert!(!ctx.apply_snapshot(at(ConversationState::CollectingProduct)));
        assert_eq!(ctx, before);
    }

    #[test]
    fn test_complete_is_terminal_but_refinable() {
        let mut ctx = at(ConversationState::Complete);

        // A later snapshot at Complete may still refine the ticket id.
        let mut refined = at(ConversationState::Complete);
        refined.ticket_id = Some("TCK-1042".to_string());
        assert!(ctx.apply_snapshot(refined));
        assert_eq!(ctx.ticket_id.as_deref(), Some("TCK-1042"));

        // But nothing moves the state out of Complete.
        assert!(!ctx.apply_snapshot(at(ConversationState::Confirming)));
        assert_eq!(ctx.state, ConversationState::Complete);
    }

    #[test]
    fn test_equal_state_snapshot_is_adopted() {
        let mut ctx = at(ConversationState::CollectingUrgency);
        let mut next = at(ConversationState::CollectingUrgency);
        next.urgency = Some(Urgency::High);

        assert!(ctx.apply_snapshot(next));
        assert_eq!(ctx.urgency, Some(Urgency::High));
    }

    #[test]
    fn test_wire_format_is_snake_case() {
        let json = serde_json::to_string(&ConversationState::CollectingProduct).unwrap();
        assert_eq!(json, "\"collecting_product\"");
        let back: ConversationState = serde_json::from_str("\"collecting_urgency\"").unwrap();
        assert_eq!(back, ConversationState::CollectingUrgency);
    }
}
