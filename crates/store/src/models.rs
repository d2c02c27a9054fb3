//! Persistent models for agents, handoffs, and the assignment ledger.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Role of a human agent on a bot's console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AgentRole {
    /// Regular agent: may only assign to online agents.
    Agent,
    /// Supervisor: may pre-assign to offline agents and force bulk reassigns.
    Supervisor,
}

/// A human agent, created and refreshed externally on login/logout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    /// Externally authenticated identity.
    pub id: String,
    /// Bot whose console this agent works.
    pub bot_id: String,
    /// Display name.
    pub name: String,
    /// Contact email, if known.
    pub email: Option<String>,
    /// Role granted to this agent.
    pub role: AgentRole,
    /// Current presence.
    pub online: bool,
    /// Creation timestamp.
    pub created_at: String,
    /// Last update timestamp.
    pub updated_at: String,
}

/// Lifecycle state of a handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum HandoffStatus {
    /// Waiting in the unowned pool.
    Pending,
    /// Owned by exactly one agent.
    Assigned,
    /// Terminal: the conversation returned to automated handling or ended.
    Resolved,
}

impl HandoffStatus {
    /// Stable lowercase name, matching the stored TEXT value.
    pub fn as_str(&self) -> &'static str {
        match self {
            HandoffStatus::Pending => "pending",
            HandoffStatus::Assigned => "assigned",
            HandoffStatus::Resolved => "resolved",
        }
    }
}

impl std::fmt::Display for HandoffStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HandoffStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(HandoffStatus::Pending),
            "assigned" => Ok(HandoffStatus::Assigned),
            "resolved" => Ok(HandoffStatus::Resolved),
            other => Err(format!("unknown handoff status: {other}")),
        }
    }
}

/// A conversation escalated from automated handling to a human.
///
/// Invariant: `assigned_agent_id` is non-null exactly when
/// `status == Assigned`. Rows are never deleted in normal operation;
/// they transition to `Resolved` instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Handoff {
    /// UUID assigned at creation.
    pub id: String,
    /// Bot the conversation belongs to.
    pub bot_id: String,
    /// Originating conversation.
    pub conversation_id: String,
    /// Lifecycle state.
    pub status: HandoffStatus,
    /// Current owner, if any.
    pub assigned_agent_id: Option<String>,
    /// Orthogonal hold flag layered on pending/assigned.
    pub on_hold: bool,
    /// Free-form note attached at creation.
    pub comment: Option<String>,
    /// Truncated snapshot of the last user message.
    pub preview: Option<String>,
    /// Optimistic concurrency counter, incremented on every accepted write.
    pub version: i64,
    /// Creation timestamp.
    pub created_at: String,
    /// Resolution timestamp, set once on the transition to `Resolved`.
    pub resolved_at: Option<String>,
}

/// Kind of ownership change recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ActionType {
    /// First owner took the handoff from the pool.
    Assign,
    /// Ownership moved between agents without returning to the pool.
    Reassign,
    /// Ownership released back to the pool.
    Unassign,
    /// Handoff closed.
    Resolve,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Assign => "assign",
            ActionType::Reassign => "reassign",
            ActionType::Unassign => "unassign",
            ActionType::Resolve => "resolve",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only ledger row. Replaying a handoff's entries in order
/// reconstructs its ownership history exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentHistoryEntry {
    /// Auto-incrementing ledger id.
    pub id: i64,
    /// Handoff this entry belongs to.
    pub handoff_id: String,
    /// Bot the handoff belongs to.
    pub bot_id: String,
    /// Previous owner; null for an initial assign.
    pub from_agent_id: Option<String>,
    /// New owner; null for unassign and resolve.
    pub to_agent_id: Option<String>,
    /// What happened.
    pub action_type: ActionType,
    /// When the transition committed.
    pub created_at: String,
}
