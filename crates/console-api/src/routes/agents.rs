//! Agent directory endpoints.

use assignment_engine::directory::NewAgent;
use assignment_engine::ReassignAllOutcome;
use axum::extract::{Path, Query, State};
use axum::Json;
use handoff_store::{Agent, AgentRole};
use serde::Deserialize;

use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotQuery {
    pub bot_id: String,
}

/// `GET /agents?botId=`
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<BotQuery>,
) -> Result<Json<Vec<Agent>>> {
    let agents = state.directory.list_agents(&query.bot_id).await?;
    Ok(Json(agents))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertAgentRequest {
    pub id: String,
    pub bot_id: String,
    pub name: String,
    pub email: Option<String>,
    pub role: AgentRole,
}

/// `POST /agents`: register or refresh an agent on login.
pub async fn upsert(
    State(state): State<AppState>,
    Json(body): Json<UpsertAgentRequest>,
) -> Result<Json<Agent>> {
    let agent = state
        .directory
        .upsert_agent(&NewAgent {
            id: &body.id,
            bot_id: &body.bot_id,
            name: &body.name,
            email: body.email.as_deref(),
            role: body.role,
        })
        .await?;
    Ok(Json(agent))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRequest {
    pub online: bool,
}

/// `POST /agents/:id/presence`
pub async fn set_presence(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<PresenceRequest>,
) -> Result<Json<Agent>> {
    let agent = state.directory.set_online(&id, body.online).await?;
    Ok(Json(agent))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignAllRequest {
    pub bot_id: String,
}

/// `POST /agents/:id/reassignAll`: return everything the agent owns to
/// the pool.
pub async fn reassign_all(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ReassignAllRequest>,
) -> Result<Json<ReassignAllOutcome>> {
    let outcome = state.engine.reassign_all(&id, &body.bot_id).await?;
    Ok(Json(outcome))
}
