//! Handoff persistence, including the compare-and-set transition primitive.
//!
//! Every mutation of an existing handoff goes through a version-guarded
//! UPDATE. Callers read the current row, decide the next state, and pass the
//! version they read; if another writer got there first the update matches
//! zero rows and the call fails with [`StoreError::Conflict`]. There is no
//! global lock; contention is scoped to a single handoff row.

use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::{Result, StoreError};
use crate::models::{ActionType, Handoff, HandoffStatus};

const HANDOFF_COLUMNS: &str = "id, bot_id, conversation_id, status, assigned_agent_id, \
     on_hold, comment, preview, version, created_at, resolved_at";

/// Parameters for creating a handoff. Initial status is always `pending`.
#[derive(Debug, Clone, Copy)]
pub struct NewHandoff<'a> {
    pub id: &'a str,
    pub bot_id: &'a str,
    pub conversation_id: &'a str,
    pub comment: Option<&'a str>,
    pub preview: Option<&'a str>,
    pub created_at: &'a str,
}

/// The target state of a version-guarded transition.
#[derive(Debug, Clone, Copy)]
pub struct HandoffUpdate<'a> {
    pub status: HandoffStatus,
    pub assigned_agent_id: Option<&'a str>,
    pub resolved_at: Option<&'a str>,
}

/// Ledger entry appended in the same transaction as its transition.
#[derive(Debug, Clone, Copy)]
pub struct NewHistoryEntry<'a> {
    pub handoff_id: &'a str,
    pub bot_id: &'a str,
    pub from_agent_id: Option<&'a str>,
    pub to_agent_id: Option<&'a str>,
    pub action_type: ActionType,
    pub created_at: &'a str,
}

/// Insert a new handoff in the `pending` state.
pub async fn create_handoff(pool: &SqlitePool, new: &NewHandoff<'_>) -> Result<Handoff> {
    sqlx::query(
        r#"
        INSERT INTO handoffs (id, bot_id, conversation_id, status, comment, preview, created_at)
        VALUES (?, ?, ?, 'pending', ?, ?, ?)
        "#,
    )
    .bind(new.id)
    .bind(new.bot_id)
    .bind(new.conversation_id)
    .bind(new.comment)
    .bind(new.preview)
    .bind(new.created_at)
    .execute(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return StoreError::AlreadyExists {
                    entity: "Handoff",
                    id: new.id.to_string(),
                };
            }
        }
        StoreError::Sqlx(e)
    })?;

    get_handoff(pool, new.id).await
}

/// Get a handoff by id.
pub async fn get_handoff(pool: &SqlitePool, id: &str) -> Result<Handoff> {
    let handoff = sqlx::query_as::<_, Handoff>(&format!(
        "SELECT {HANDOFF_COLUMNS} FROM handoffs WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    handoff.ok_or_else(|| StoreError::NotFound {
        entity: "Handoff",
        id: id.to_string(),
    })
}

/// List handoffs for a bot, optionally filtered by status, newest first.
pub async fn list_by_bot(
    pool: &SqlitePool,
    bot_id: &str,
    status: Option<HandoffStatus>,
) -> Result<Vec<Handoff>> {
    let handoffs = match status {
        Some(status) => {
            sqlx::query_as::<_, Handoff>(&format!(
                r#"
                SELECT {HANDOFF_COLUMNS}
                FROM handoffs
                WHERE bot_id = ? AND status = ?
                ORDER BY created_at DESC
                "#
            ))
            .bind(bot_id)
            .bind(status)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, Handoff>(&format!(
                r#"
                SELECT {HANDOFF_COLUMNS}
                FROM handoffs
                WHERE bot_id = ?
                ORDER BY created_at DESC
                "#
            ))
            .bind(bot_id)
            .fetch_all(pool)
            .await?
        }
    };

    Ok(handoffs)
}

/// List handoffs currently owned by an agent for a bot, oldest first.
pub async fn list_assigned_to(
    pool: &SqlitePool,
    agent_id: &str,
    bot_id: &str,
) -> Result<Vec<Handoff>> {
    let handoffs = sqlx::query_as::<_, Handoff>(&format!(
        r#"
        SELECT {HANDOFF_COLUMNS}
        FROM handoffs
        WHERE assigned_agent_id = ? AND bot_id = ? AND status = 'assigned'
        ORDER BY created_at ASC
        "#
    ))
    .bind(agent_id)
    .bind(bot_id)
    .fetch_all(pool)
    .await?;

    Ok(handoffs)
}

/// Apply a state transition and append its ledger entry as one atomic unit.
///
/// The UPDATE is guarded on `expected_version`; if it matches zero rows the
/// whole transaction is abandoned and the call returns
/// [`StoreError::Conflict`] (or [`StoreError::NotFound`] if the handoff does
/// not exist at all). On success the store and ledger commit together.
pub async fn apply_transition(
    pool: &SqlitePool,
    id: &str,
    expected_version: i64,
    update: HandoffUpdate<'_>,
    entry: &NewHistoryEntry<'_>,
) -> Result<Handoff> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        UPDATE handoffs
        SET status = ?, assigned_agent_id = ?, resolved_at = ?, version = version + 1
        WHERE id = ? AND version = ?
        "#,
    )
    .bind(update.status)
    .bind(update.assigned_agent_id)
    .bind(update.resolved_at)
    .bind(id)
    .bind(expected_version)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Err(stale_write_error(pool, id).await?);
    }

    append_history(&mut tx, entry).await?;

    let updated = sqlx::query_as::<_, Handoff>(&format!(
        "SELECT {HANDOFF_COLUMNS} FROM handoffs WHERE id = ?"
    ))
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(updated)
}

/// Set or clear the hold flag, guarded on `expected_version`.
///
/// The flag is orthogonal to status and does not touch ownership, so no
/// ledger entry is written.
pub async fn set_on_hold(
    pool: &SqlitePool,
    id: &str,
    expected_version: i64,
    on_hold: bool,
) -> Result<Handoff> {
    let result = sqlx::query(
        r#"
        UPDATE handoffs
        SET on_hold = ?, version = version + 1
        WHERE id = ? AND version = ?
        "#,
    )
    .bind(on_hold)
    .bind(id)
    .bind(expected_version)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(stale_write_error(pool, id).await?);
    }

    get_handoff(pool, id).await
}

/// Decide whether a zero-row guarded UPDATE was a lost race or a missing row.
async fn stale_write_error(pool: &SqlitePool, id: &str) -> Result<StoreError> {
    let exists = sqlx::query_scalar::<_, i32>("SELECT 1 FROM handoffs WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(match exists {
        Some(_) => StoreError::Conflict { id: id.to_string() },
        None => StoreError::NotFound {
            entity: "Handoff",
            id: id.to_string(),
        },
    })
}

async fn append_history(
    tx: &mut Transaction<'_, Sqlite>,
    entry: &NewHistoryEntry<'_>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO assignment_history
            (handoff_id, bot_id, from_agent_id, to_agent_id, action_type, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.handoff_id)
    .bind(entry.bot_id)
    .bind(entry.from_agent_id)
    .bind(entry.to_agent_id)
    .bind(entry.action_type)
    .bind(entry.created_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time;
    use crate::Store;

    async fn test_store() -> Store {
        // In-memory SQLite is per-connection; keep the pool at one.
        let store = Store::connect_with_pool_size("sqlite::memory:", 1)
            .await
            .unwrap();
        store.migrate().await.unwrap();
        store
    }

    async fn seed_handoff(store: &Store, id: &str) -> Handoff {
        let new = NewHandoff {
            id,
            bot_id: "bot-1",
            conversation_id: "conv-1",
            comment: None,
            preview: Some("hello there"),
            created_at: &time::now(),
        };
        create_handoff(store.pool(), &new).await.unwrap()
    }

    fn assign_entry<'a>(h: &'a Handoff, to: &'a str, at: &'a str) -> NewHistoryEntry<'a> {
        NewHistoryEntry {
            handoff_id: &h.id,
            bot_id: &h.bot_id,
            from_agent_id: h.assigned_agent_id.as_deref(),
            to_agent_id: Some(to),
            action_type: ActionType::Assign,
            created_at: at,
        }
    }

    #[tokio::test]
    async fn test_create_starts_pending_and_unowned() {
        let store = test_store().await;
        let h = seed_handoff(&store, "h1").await;

        assert_eq!(h.status, HandoffStatus::Pending);
        assert_eq!(h.assigned_agent_id, None);
        assert_eq!(h.version, 0);
        assert!(!h.on_hold);
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected() {
        let store = test_store().await;
        seed_handoff(&store, "h1").await;

        let now = time::now();
        let dup = NewHandoff {
            id: "h1",
            bot_id: "bot-1",
            conversation_id: "conv-2",
            comment: None,
            preview: None,
            created_at: &now,
        };
        let result = create_handoff(store.pool(), &dup).await;
        assert!(matches!(result, Err(StoreError::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn test_transition_commits_update_and_ledger_together() {
        let store = test_store().await;
        let h = seed_handoff(&store, "h1").await;
        let now = time::now();

        let updated = apply_transition(
            store.pool(),
            &h.id,
            h.version,
            HandoffUpdate {
                status: HandoffStatus::Assigned,
                assigned_agent_id: Some("agent-1"),
                resolved_at: None,
            },
            &assign_entry(&h, "agent-1", &now),
        )
        .await
        .unwrap();

        assert_eq!(updated.status, HandoffStatus::Assigned);
        assert_eq!(updated.assigned_agent_id.as_deref(), Some("agent-1"));
        assert_eq!(updated.version, 1);

        let entries = crate::history::list_for_handoff(store.pool(), &h.id)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action_type, ActionType::Assign);
    }

    #[tokio::test]
    async fn test_stale_version_conflicts() {
        let store = test_store().await;
        let h = seed_handoff(&store, "h1").await;
        let now = time::now();

        apply_transition(
            store.pool(),
            &h.id,
            h.version,
            HandoffUpdate {
                status: HandoffStatus::Assigned,
                assigned_agent_id: Some("agent-1"),
                resolved_at: None,
            },
            &assign_entry(&h, "agent-1", &now),
        )
        .await
        .unwrap();

        // Second writer still holds version 0.
        let result = apply_transition(
            store.pool(),
            &h.id,
            h.version,
            HandoffUpdate {
                status: HandoffStatus::Assigned,
                assigned_agent_id: Some("agent-2"),
                resolved_at: None,
            },
            &assign_entry(&h, "agent-2", &now),
        )
        .await;

        assert!(matches!(result, Err(StoreError::Conflict { .. })));

        // The loser left no trace: still owned by the winner, one ledger row.
        let current = get_handoff(store.pool(), &h.id).await.unwrap();
        assert_eq!(current.assigned_agent_id.as_deref(), Some("agent-1"));
        let entries = crate::history::list_for_handoff(store.pool(), &h.id)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_transition_on_missing_handoff_is_not_found() {
        let store = test_store().await;
        let now = time::now();

        let entry = NewHistoryEntry {
            handoff_id: "ghost",
            bot_id: "bot-1",
            from_agent_id: None,
            to_agent_id: Some("agent-1"),
            action_type: ActionType::Assign,
            created_at: &now,
        };
        let result = apply_transition(
            store.pool(),
            "ghost",
            0,
            HandoffUpdate {
                status: HandoffStatus::Assigned,
                assigned_agent_id: Some("agent-1"),
                resolved_at: None,
            },
            &entry,
        )
        .await;

        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_hold_flag_does_not_touch_ownership() {
        let store = test_store().await;
        let h = seed_handoff(&store, "h1").await;

        let held = set_on_hold(store.pool(), &h.id, h.version, true).await.unwrap();
        assert!(held.on_hold);
        assert_eq!(held.status, HandoffStatus::Pending);
        assert_eq!(held.assigned_agent_id, None);
        assert_eq!(held.version, 1);

        let entries = crate::history::list_for_handoff(store.pool(), &h.id)
            .await
            .unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_list_filters() {
        let store = test_store().await;
        let h1 = seed_handoff(&store, "h1").await;
        seed_handoff(&store, "h2").await;
        let now = time::now();

        apply_transition(
            store.pool(),
            &h1.id,
            h1.version,
            HandoffUpdate {
                status: HandoffStatus::Assigned,
                assigned_agent_id: Some("agent-1"),
                resolved_at: None,
            },
            &assign_entry(&h1, "agent-1", &now),
        )
        .await
        .unwrap();

        let all = list_by_bot(store.pool(), "bot-1", None).await.unwrap();
        assert_eq!(all.len(), 2);

        let pending = list_by_bot(store.pool(), "bot-1", Some(HandoffStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "h2");

        let owned = list_assigned_to(store.pool(), "agent-1", "bot-1").await.unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].id, "h1");
    }
}
