//! Dashboard counters.

use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use handoff_store::BotStats;

use crate::error::Result;
use crate::routes::agents::BotQuery;
use crate::state::AppState;

/// `GET /stats?botId=`
pub async fn stats(
    State(state): State<AppState>,
    Query(query): Query<BotQuery>,
) -> Result<Json<BotStats>> {
    let stats = state.stats.for_bot(&query.bot_id, Utc::now()).await?;
    Ok(Json(stats))
}
