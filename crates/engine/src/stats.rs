//! On-demand stats over the handoff store.

use chrono::{DateTime, Utc};
use handoff_store::{stats, BotStats, Store};

use crate::error::Result;

/// Derives console counters from committed store state. Reads never block
/// writers; a result may trail an in-flight transition by one commit.
#[derive(Clone)]
pub struct StatsAggregator {
    store: Store,
}

impl StatsAggregator {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Counters for a bot. `now` anchors the `resolved_today` calendar day.
    pub async fn for_bot(&self, bot_id: &str, now: DateTime<Utc>) -> Result<BotStats> {
        Ok(stats::bot_stats(self.store.pool(), bot_id, now).await?)
    }
}
