//! Derived per-bot counts over the handoff store.
//!
//! Pure reads; safe to run concurrently with transitions. Results reflect
//! the latest committed state, never an in-flight transaction.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use crate::time::format_timestamp;
use crate::Result;

/// Counters shown on a bot's console dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotStats {
    /// Handoffs not yet resolved.
    pub total_active: i64,
    /// Alias of `total_active`, kept for the dashboard contract.
    pub unresolved: i64,
    /// Handoffs waiting in the pool or pre-assigned but not taken.
    pub pending: i64,
    /// Non-resolved handoffs with no current owner.
    pub unassigned: i64,
    /// Handoffs resolved within the caller's current calendar day.
    pub resolved_today: i64,
    /// Non-resolved handoffs with the hold flag set.
    pub on_hold: i64,
}

#[derive(FromRow)]
struct StatsRow {
    total_active: i64,
    pending: i64,
    unassigned: i64,
    resolved_today: i64,
    on_hold: i64,
}

/// Compute the counters for a bot. `now` anchors the calendar day used for
/// `resolved_today`, so callers control the clock.
pub async fn bot_stats(pool: &SqlitePool, bot_id: &str, now: DateTime<Utc>) -> Result<BotStats> {
    let day_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let day_end = day_start + Duration::days(1);

    let row = sqlx::query_as::<_, StatsRow>(
        r#"
        SELECT
            COUNT(*) FILTER (WHERE status != 'resolved') AS total_active,
            COUNT(*) FILTER (WHERE status = 'pending') AS pending,
            COUNT(*) FILTER (WHERE assigned_agent_id IS NULL AND status != 'resolved') AS unassigned,
            COUNT(*) FILTER (WHERE status = 'resolved' AND resolved_at >= ? AND resolved_at < ?) AS resolved_today,
            COUNT(*) FILTER (WHERE on_hold = 1 AND status != 'resolved') AS on_hold
        FROM handoffs
        WHERE bot_id = ?
        "#,
    )
    .bind(format_timestamp(day_start))
    .bind(format_timestamp(day_end))
    .bind(bot_id)
    .fetch_one(pool)
    .await?;

    Ok(BotStats {
        total_active: row.total_active,
        unresolved: row.total_active,
        pending: row.pending,
        unassigned: row.unassigned,
        resolved_today: row.resolved_today,
        on_hold: row.on_hold,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handoff::{self, HandoffUpdate, NewHandoff, NewHistoryEntry};
    use crate::models::{ActionType, HandoffStatus};
    use crate::time;
    use crate::Store;
    use chrono::TimeZone;

    async fn test_store() -> Store {
        let store = Store::connect_with_pool_size("sqlite::memory:", 1)
            .await
            .unwrap();
        store.migrate().await.unwrap();
        store
    }

    async fn seed(store: &Store, id: &str) -> crate::Handoff {
        handoff::create_handoff(
            store.pool(),
            &NewHandoff {
                id,
                bot_id: "bot-1",
                conversation_id: "conv",
                comment: None,
                preview: None,
                created_at: &time::now(),
            },
        )
        .await
        .unwrap()
    }

    async fn assign(store: &Store, h: &crate::Handoff, agent: &str) -> crate::Handoff {
        handoff::apply_transition(
            store.pool(),
            &h.id,
            h.version,
            HandoffUpdate {
                status: HandoffStatus::Assigned,
                assigned_agent_id: Some(agent),
                resolved_at: None,
            },
            &NewHistoryEntry {
                handoff_id: &h.id,
                bot_id: &h.bot_id,
                from_agent_id: None,
                to_agent_id: Some(agent),
                action_type: ActionType::Assign,
                created_at: &time::now(),
            },
        )
        .await
        .unwrap()
    }

    async fn resolve_at(store: &Store, h: &crate::Handoff, at: DateTime<Utc>) {
        handoff::apply_transition(
            store.pool(),
            &h.id,
            h.version,
            HandoffUpdate {
                status: HandoffStatus::Resolved,
                assigned_agent_id: None,
                resolved_at: Some(&format_timestamp(at)),
            },
            &NewHistoryEntry {
                handoff_id: &h.id,
                bot_id: &h.bot_id,
                from_agent_id: h.assigned_agent_id.as_deref(),
                to_agent_id: None,
                action_type: ActionType::Resolve,
                created_at: &format_timestamp(at),
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_dashboard_counts() {
        let store = test_store().await;
        let now = Utc.with_ymd_and_hms(2026, 8, 26, 12, 0, 0).unwrap();
        let yesterday = now - Duration::days(1);

        // 2 pending
        seed(&store, "p1").await;
        seed(&store, "p2").await;

        // 3 assigned, one of them on hold
        for id in ["a1", "a2", "a3"] {
            let h = seed(&store, id).await;
            let h = assign(&store, &h, "agent-1").await;
            if id == "a3" {
                handoff::set_on_hold(store.pool(), &h.id, h.version, true)
                    .await
                    .unwrap();
            }
        }

        // 1 resolved today, 1 resolved yesterday
        let today = seed(&store, "r-today").await;
        let today = assign(&store, &today, "agent-1").await;
        resolve_at(&store, &today, now).await;

        let old = seed(&store, "r-old").await;
        let old = assign(&store, &old, "agent-1").await;
        resolve_at(&store, &old, yesterday).await;

        let stats = bot_stats(store.pool(), "bot-1", now).await.unwrap();
        assert_eq!(stats.total_active, 5);
        assert_eq!(stats.unresolved, 5);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.unassigned, 2);
        assert_eq!(stats.resolved_today, 1);
        assert_eq!(stats.on_hold, 1);
    }

    #[tokio::test]
    async fn test_counts_scoped_to_bot() {
        let store = test_store().await;
        seed(&store, "p1").await;

        let stats = bot_stats(store.pool(), "other-bot", Utc::now()).await.unwrap();
        assert_eq!(stats.total_active, 0);
        assert_eq!(stats.pending, 0);
    }
}
