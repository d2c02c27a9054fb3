//! The assignment state machine.
//!
//! All mutations run as one atomic unit: the handoff row update and the
//! ledger append commit together or not at all, and the bus publish happens
//! only after the commit succeeds. Concurrency control is optimistic and
//! scoped per handoff: each operation reads the current row, validates the
//! transition, then applies a version-guarded update. A lost race surfaces
//! as [`EngineError::ConflictingAssignment`] and the caller retries against
//! the now-current state.
//!
//! On top of the version guard, writers on the same handoff are serialized
//! through a per-handoff mutex held from the read through the publish. The
//! version guard alone keeps the store consistent but leaves a window
//! between commit and publish where a second committed transition could
//! reach subscribers first; the mutex closes it, so a bot topic carries one
//! handoff's events in commit order. Payloads also carry the row `version`
//! for consumers that merge idempotently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use handoff_store::handoff::{self, HandoffUpdate, NewHandoff, NewHistoryEntry};
use handoff_store::{
    agent, history, time, ActionType, AgentRole, AssignmentHistoryEntry, Handoff, HandoffStatus,
    Store, StoreError,
};
use realtime_bus::{Broadcaster, Event};
use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::conversations::Conversations;
use crate::error::{EngineError, Result};

/// Preview text is truncated to this many characters.
const PREVIEW_MAX_CHARS: usize = 160;

/// Parameters for opening a handoff whose conversation is already resolved.
#[derive(Debug, Clone, Copy)]
pub struct OpenHandoff<'a> {
    pub bot_id: &'a str,
    pub conversation_id: &'a str,
    pub comment: Option<&'a str>,
    pub preview: Option<&'a str>,
}

/// Result of a bulk reassign; also the payload of the completion event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignAllOutcome {
    pub bot_id: String,
    pub from_agent_id: String,
    /// Committed transitions only; failed handoffs are not counted.
    pub reassigned: u64,
}

/// The handoff assignment engine.
///
/// Cheap to clone; clones share the store pool and the bus.
#[derive(Clone)]
pub struct AssignmentEngine {
    store: Store,
    bus: Broadcaster,
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl AssignmentEngine {
    pub fn new(store: Store, bus: Broadcaster) -> Self {
        Self {
            store,
            bus,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The bus this engine publishes committed transitions on.
    pub fn bus(&self) -> &Broadcaster {
        &self.bus
    }

    /// Open a handoff for a conversation that needs a human, resolving the
    /// conversation and preview through the messaging collaborator.
    ///
    /// Preview capture is best effort; a messaging failure after the
    /// conversation is resolved does not fail the handoff.
    pub async fn create_handoff(
        &self,
        conversations: &dyn Conversations,
        bot_id: &str,
        visitor_id: &str,
        comment: Option<&str>,
    ) -> Result<Handoff> {
        let conversation_id = conversations
            .resolve_conversation(bot_id, visitor_id)
            .await
            .map_err(|e| EngineError::Conversation(e.to_string()))?;

        let preview = match conversations.last_message(&conversation_id).await {
            Ok(Some(snapshot)) => Some(truncate_preview(&snapshot.preview)),
            Ok(None) => None,
            Err(e) => {
                warn!(
                    conversation_id = %conversation_id,
                    error = %e,
                    "could not capture preview for new handoff"
                );
                None
            }
        };

        self.open_handoff(OpenHandoff {
            bot_id,
            conversation_id: &conversation_id,
            comment,
            preview: preview.as_deref(),
        })
        .await
    }

    /// Open a handoff for an already-resolved conversation. Initial state is
    /// `pending` with no owner.
    pub async fn open_handoff(&self, req: OpenHandoff<'_>) -> Result<Handoff> {
        let id = Uuid::new_v4().to_string();
        let now = time::now();

        let created = handoff::create_handoff(
            self.store.pool(),
            &NewHandoff {
                id: &id,
                bot_id: req.bot_id,
                conversation_id: req.conversation_id,
                comment: req.comment,
                preview: req.preview,
                created_at: &now,
            },
        )
        .await?;

        info!(
            handoff_id = %created.id,
            bot_id = %req.bot_id,
            conversation_id = %req.conversation_id,
            "handoff opened"
        );
        Ok(created)
    }

    /// Give a handoff to an agent.
    ///
    /// Allowed from `pending` and `assigned`. Moving an already-owned
    /// handoff to a different agent is recorded as a reassign; assigning to
    /// the current owner is a no-op. The target must be online unless the
    /// acting agent is a supervisor pre-assigning to an offline agent.
    pub async fn assign(
        &self,
        handoff_id: &str,
        to_agent_id: &str,
        acting_agent_id: &str,
    ) -> Result<Handoff> {
        let guard = self.lock_handoff(handoff_id).await;
        let result = self
            .assign_locked(handoff_id, to_agent_id, acting_agent_id)
            .await;
        drop(guard);
        self.prune_lock(handoff_id);
        result
    }

    async fn assign_locked(
        &self,
        handoff_id: &str,
        to_agent_id: &str,
        acting_agent_id: &str,
    ) -> Result<Handoff> {
        let current = handoff::get_handoff(self.store.pool(), handoff_id).await?;
        require_open(&current, "assign")?;

        if current.assigned_agent_id.as_deref() == Some(to_agent_id) {
            debug!(handoff_id = %handoff_id, agent_id = %to_agent_id, "assign is a no-op");
            return Ok(current);
        }

        let target = agent::get_agent(self.store.pool(), to_agent_id).await?;
        if !target.online {
            let acting = agent::get_agent(self.store.pool(), acting_agent_id).await?;
            if acting.role != AgentRole::Supervisor {
                return Err(EngineError::AgentUnavailable {
                    agent_id: to_agent_id.to_string(),
                });
            }
            debug!(
                handoff_id = %handoff_id,
                agent_id = %to_agent_id,
                supervisor = %acting_agent_id,
                "supervisor pre-assigning to offline agent"
            );
        }

        let action = match current.assigned_agent_id {
            None => ActionType::Assign,
            Some(_) => ActionType::Reassign,
        };

        let now = time::now();
        let updated = handoff::apply_transition(
            self.store.pool(),
            handoff_id,
            current.version,
            HandoffUpdate {
                status: HandoffStatus::Assigned,
                assigned_agent_id: Some(to_agent_id),
                resolved_at: None,
            },
            &NewHistoryEntry {
                handoff_id,
                bot_id: &current.bot_id,
                from_agent_id: current.assigned_agent_id.as_deref(),
                to_agent_id: Some(to_agent_id),
                action_type: action,
                created_at: &now,
            },
        )
        .await?;

        self.bus
            .publish(&updated.bot_id, Event::handoff_assigned(&updated));
        info!(
            handoff_id = %handoff_id,
            to = %to_agent_id,
            from = ?current.assigned_agent_id,
            action = %action,
            "handoff assigned"
        );
        Ok(updated)
    }

    /// Release a handoff back to the pool. Valid only from `assigned`.
    pub async fn unassign(&self, handoff_id: &str, acting_agent_id: &str) -> Result<Handoff> {
        let guard = self.lock_handoff(handoff_id).await;
        let result = self.unassign_locked(handoff_id, acting_agent_id).await;
        drop(guard);
        self.prune_lock(handoff_id);
        result
    }

    async fn unassign_locked(&self, handoff_id: &str, acting_agent_id: &str) -> Result<Handoff> {
        let current = handoff::get_handoff(self.store.pool(), handoff_id).await?;
        if current.status != HandoffStatus::Assigned {
            return Err(EngineError::InvalidTransition {
                action: "unassign",
                status: current.status,
            });
        }

        let now = time::now();
        let updated = handoff::apply_transition(
            self.store.pool(),
            handoff_id,
            current.version,
            HandoffUpdate {
                status: HandoffStatus::Pending,
                assigned_agent_id: None,
                resolved_at: None,
            },
            &NewHistoryEntry {
                handoff_id,
                bot_id: &current.bot_id,
                from_agent_id: current.assigned_agent_id.as_deref(),
                to_agent_id: None,
                action_type: ActionType::Unassign,
                created_at: &now,
            },
        )
        .await?;

        self.bus
            .publish(&updated.bot_id, Event::handoff_unassigned(&updated));
        info!(
            handoff_id = %handoff_id,
            from = ?current.assigned_agent_id,
            acting = %acting_agent_id,
            "handoff returned to pool"
        );
        Ok(updated)
    }

    /// Close a handoff. Valid from `assigned` and `pending`; terminal.
    pub async fn resolve(&self, handoff_id: &str, acting_agent_id: &str) -> Result<Handoff> {
        let guard = self.lock_handoff(handoff_id).await;
        let result = self.resolve_locked(handoff_id, acting_agent_id).await;
        drop(guard);
        self.prune_lock(handoff_id);
        result
    }

    async fn resolve_locked(&self, handoff_id: &str, acting_agent_id: &str) -> Result<Handoff> {
        let current = handoff::get_handoff(self.store.pool(), handoff_id).await?;
        require_open(&current, "resolve")?;

        let now = time::now();
        let updated = handoff::apply_transition(
            self.store.pool(),
            handoff_id,
            current.version,
            HandoffUpdate {
                status: HandoffStatus::Resolved,
                assigned_agent_id: None,
                resolved_at: Some(&now),
            },
            &NewHistoryEntry {
                handoff_id,
                bot_id: &current.bot_id,
                from_agent_id: current.assigned_agent_id.as_deref(),
                to_agent_id: None,
                action_type: ActionType::Resolve,
                created_at: &now,
            },
        )
        .await?;

        self.bus
            .publish(&updated.bot_id, Event::handoff_resolved(&updated));
        info!(handoff_id = %handoff_id, acting = %acting_agent_id, "handoff resolved");
        Ok(updated)
    }

    /// Set the hold flag. Ownership and status are untouched.
    pub async fn hold(&self, handoff_id: &str) -> Result<Handoff> {
        self.set_hold(handoff_id, true, "hold").await
    }

    /// Clear the hold flag.
    pub async fn release(&self, handoff_id: &str) -> Result<Handoff> {
        self.set_hold(handoff_id, false, "release").await
    }

    async fn set_hold(&self, handoff_id: &str, on_hold: bool, action: &'static str) -> Result<Handoff> {
        let guard = self.lock_handoff(handoff_id).await;
        let result = self.set_hold_locked(handoff_id, on_hold, action).await;
        drop(guard);
        self.prune_lock(handoff_id);
        result
    }

    async fn set_hold_locked(
        &self,
        handoff_id: &str,
        on_hold: bool,
        action: &'static str,
    ) -> Result<Handoff> {
        let current = handoff::get_handoff(self.store.pool(), handoff_id).await?;
        require_open(&current, action)?;

        if current.on_hold == on_hold {
            return Ok(current);
        }

        let updated =
            handoff::set_on_hold(self.store.pool(), handoff_id, current.version, on_hold).await?;
        debug!(handoff_id = %handoff_id, on_hold, "hold flag updated");
        Ok(updated)
    }

    /// Return every handoff currently owned by an agent to the pool.
    ///
    /// Invoked when an agent goes offline or a supervisor forces it. Each
    /// handoff's transition is independent: one failure is logged and
    /// skipped, never aborting the batch. The returned count reflects only
    /// committed transitions, which also makes redundant invocations safe.
    pub async fn reassign_all(&self, from_agent_id: &str, bot_id: &str) -> Result<ReassignAllOutcome> {
        let owned =
            handoff::list_assigned_to(self.store.pool(), from_agent_id, bot_id).await?;

        let mut reassigned = 0u64;
        for h in owned {
            match self.return_to_pool(&h, from_agent_id).await {
                Ok(true) => reassigned += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        handoff_id = %h.id,
                        from = %from_agent_id,
                        error = %e,
                        "skipping handoff during bulk reassign"
                    );
                }
            }
        }

        let outcome = ReassignAllOutcome {
            bot_id: bot_id.to_string(),
            from_agent_id: from_agent_id.to_string(),
            reassigned,
        };
        self.bus
            .publish(bot_id, Event::reassign_all_completed(&outcome));
        info!(
            from = %from_agent_id,
            bot_id = %bot_id,
            reassigned,
            "bulk reassign completed"
        );
        Ok(outcome)
    }

    /// Unassign one handoff during a bulk reassign. Retries once on a lost
    /// race; returns false if the handoff no longer belongs to the agent.
    async fn return_to_pool(&self, h: &Handoff, from_agent_id: &str) -> Result<bool> {
        let guard = self.lock_handoff(&h.id).await;
        let result = self.return_to_pool_locked(h, from_agent_id).await;
        drop(guard);
        self.prune_lock(&h.id);
        result
    }

    async fn return_to_pool_locked(&self, h: &Handoff, from_agent_id: &str) -> Result<bool> {
        let mut current = h.clone();
        for attempt in 0..2 {
            if current.status != HandoffStatus::Assigned
                || current.assigned_agent_id.as_deref() != Some(from_agent_id)
            {
                return Ok(false);
            }

            let now = time::now();
            let result = handoff::apply_transition(
                self.store.pool(),
                &current.id,
                current.version,
                HandoffUpdate {
                    status: HandoffStatus::Pending,
                    assigned_agent_id: None,
                    resolved_at: None,
                },
                &NewHistoryEntry {
                    handoff_id: &current.id,
                    bot_id: &current.bot_id,
                    from_agent_id: Some(from_agent_id),
                    to_agent_id: None,
                    action_type: ActionType::Unassign,
                    created_at: &now,
                },
            )
            .await;

            match result {
                Ok(updated) => {
                    self.bus
                        .publish(&updated.bot_id, Event::handoff_unassigned(&updated));
                    return Ok(true);
                }
                Err(StoreError::Conflict { .. }) if attempt == 0 => {
                    current = handoff::get_handoff(self.store.pool(), &current.id).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(false)
    }

    /// Get a handoff by id.
    pub async fn get(&self, handoff_id: &str) -> Result<Handoff> {
        Ok(handoff::get_handoff(self.store.pool(), handoff_id).await?)
    }

    /// List a bot's handoffs, optionally filtered by status.
    pub async fn list(
        &self,
        bot_id: &str,
        status: Option<HandoffStatus>,
    ) -> Result<Vec<Handoff>> {
        Ok(handoff::list_by_bot(self.store.pool(), bot_id, status).await?)
    }

    /// The audit trail for a handoff, oldest entry first.
    pub async fn history(&self, handoff_id: &str) -> Result<Vec<AssignmentHistoryEntry>> {
        // Surface NotFound for unknown ids rather than an empty trail.
        handoff::get_handoff(self.store.pool(), handoff_id).await?;
        Ok(history::list_for_handoff(self.store.pool(), handoff_id).await?)
    }

    /// Take this handoff's writer mutex. Held from the read through the
    /// publish so the topic sees one handoff's events in commit order.
    async fn lock_handoff(&self, handoff_id: &str) -> OwnedMutexGuard<()> {
        let cell = {
            let mut locks = self.lock_map();
            locks.entry(handoff_id.to_string()).or_default().clone()
        };
        cell.lock_owned().await
    }

    /// Drop the mutex entry once no writer holds or awaits it. The check
    /// runs under the map lock, so a concurrent `lock_handoff` either sees
    /// the entry before removal or creates a fresh one afterwards.
    fn prune_lock(&self, handoff_id: &str) {
        let mut locks = self.lock_map();
        if let Some(cell) = locks.get(handoff_id) {
            if Arc::strong_count(cell) == 1 {
                locks.remove(handoff_id);
            }
        }
    }

    fn lock_map(&self) -> MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn require_open(h: &Handoff, action: &'static str) -> Result<()> {
    if h.status == HandoffStatus::Resolved {
        return Err(EngineError::InvalidTransition {
            action,
            status: h.status,
        });
    }
    Ok(())
}

/// Truncate preview text on a character boundary.
fn truncate_preview(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(PREVIEW_MAX_CHARS) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
