//! Assignment ledger queries.
//!
//! Entries are written only by [`crate::handoff::apply_transition`], inside
//! the same transaction as the handoff mutation they record.

use sqlx::SqlitePool;

use crate::models::AssignmentHistoryEntry;
use crate::Result;

const ENTRY_COLUMNS: &str =
    "id, handoff_id, bot_id, from_agent_id, to_agent_id, action_type, created_at";

/// All ledger entries for a handoff, oldest first.
///
/// This ordering is the audit-export contract: replaying the returned
/// entries reconstructs the handoff's ownership history.
pub async fn list_for_handoff(
    pool: &SqlitePool,
    handoff_id: &str,
) -> Result<Vec<AssignmentHistoryEntry>> {
    let entries = sqlx::query_as::<_, AssignmentHistoryEntry>(&format!(
        r#"
        SELECT {ENTRY_COLUMNS}
        FROM assignment_history
        WHERE handoff_id = ?
        ORDER BY created_at ASC, id ASC
        "#
    ))
    .bind(handoff_id)
    .fetch_all(pool)
    .await?;

    Ok(entries)
}

/// Recent ledger entries for a bot, newest first.
pub async fn list_for_bot(
    pool: &SqlitePool,
    bot_id: &str,
    limit: i64,
) -> Result<Vec<AssignmentHistoryEntry>> {
    let entries = sqlx::query_as::<_, AssignmentHistoryEntry>(&format!(
        r#"
        SELECT {ENTRY_COLUMNS}
        FROM assignment_history
        WHERE bot_id = ?
        ORDER BY created_at DESC, id DESC
        LIMIT ?
        "#
    ))
    .bind(bot_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handoff::{self, HandoffUpdate, NewHandoff, NewHistoryEntry};
    use crate::models::{ActionType, HandoffStatus};
    use crate::time;
    use crate::Store;

    #[tokio::test]
    async fn test_entries_returned_in_append_order() {
        let store = Store::connect_with_pool_size("sqlite::memory:", 1)
            .await
            .unwrap();
        store.migrate().await.unwrap();

        let h = handoff::create_handoff(
            store.pool(),
            &NewHandoff {
                id: "h1",
                bot_id: "bot-1",
                conversation_id: "conv-1",
                comment: None,
                preview: None,
                created_at: &time::now(),
            },
        )
        .await
        .unwrap();

        // assign -> unassign -> assign again
        let steps: [(HandoffStatus, Option<&str>, ActionType); 3] = [
            (HandoffStatus::Assigned, Some("agent-1"), ActionType::Assign),
            (HandoffStatus::Pending, None, ActionType::Unassign),
            (HandoffStatus::Assigned, Some("agent-2"), ActionType::Assign),
        ];

        let mut current = h;
        for (status, owner, action) in steps {
            let now = time::now();
            current = handoff::apply_transition(
                store.pool(),
                &current.id,
                current.version,
                HandoffUpdate {
                    status,
                    assigned_agent_id: owner,
                    resolved_at: None,
                },
                &NewHistoryEntry {
                    handoff_id: &current.id,
                    bot_id: &current.bot_id,
                    from_agent_id: current.assigned_agent_id.as_deref(),
                    to_agent_id: owner,
                    action_type: action,
                    created_at: &now,
                },
            )
            .await
            .unwrap();
        }

        let entries = list_for_handoff(store.pool(), "h1").await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries.iter().map(|e| e.action_type).collect::<Vec<_>>(),
            vec![ActionType::Assign, ActionType::Unassign, ActionType::Assign]
        );
        assert_eq!(entries[1].from_agent_id.as_deref(), Some("agent-1"));
        assert_eq!(entries[1].to_agent_id, None);

        let recent = list_for_bot(store.pool(), "bot-1", 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].to_agent_id.as_deref(), Some("agent-2"));
    }
}
