//! Wire events pushed to console sessions.
//!
//! Every event is `{ resource, type, payload }` with a per-topic sequence
//! number assigned at publish time, so clients can merge duplicates
//! idempotently.

use serde::Serialize;
use serde_json::Value;

/// A state-change event on a bot topic.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    /// Per-topic sequence, assigned by the bus on publish.
    pub seq: u64,
    /// Entity kind the event is about.
    pub resource: &'static str,
    /// What happened to it.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Entity snapshot, shaped like the store model it mirrors.
    pub payload: Value,
}

impl Event {
    fn new<T: Serialize>(resource: &'static str, kind: &'static str, payload: &T) -> Self {
        Self {
            seq: 0,
            resource,
            kind,
            // Serializing our own derive(Serialize) models cannot fail.
            payload: serde_json::to_value(payload).unwrap_or(Value::Null),
        }
    }

    /// A handoff gained an owner (assign or reassign).
    pub fn handoff_assigned<T: Serialize>(handoff: &T) -> Self {
        Self::new("handoff", "assigned", handoff)
    }

    /// A handoff returned to the pool.
    pub fn handoff_unassigned<T: Serialize>(handoff: &T) -> Self {
        Self::new("handoff", "unassigned", handoff)
    }

    /// A handoff reached its terminal state.
    pub fn handoff_resolved<T: Serialize>(handoff: &T) -> Self {
        Self::new("handoff", "resolved", handoff)
    }

    /// A bulk reassign finished; payload carries the committed count.
    pub fn reassign_all_completed<T: Serialize>(outcome: &T) -> Self {
        Self::new("handoff", "reassignAllCompleted", outcome)
    }

    /// An agent's presence changed.
    pub fn agent_status_changed<T: Serialize>(agent: &T) -> Self {
        Self::new("agent", "statusChanged", agent)
    }

    /// A new message arrived on a conversation backing a handoff.
    pub fn conversation_message<T: Serialize>(snapshot: &T) -> Self {
        Self::new("conversation", "message", snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        #[derive(Serialize)]
        struct Payload {
            id: &'static str,
        }

        let event = Event::handoff_assigned(&Payload { id: "h1" });
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["resource"], "handoff");
        assert_eq!(json["type"], "assigned");
        assert_eq!(json["payload"]["id"], "h1");
    }
}
