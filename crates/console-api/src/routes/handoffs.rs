//! Handoff lifecycle endpoints.

use assignment_engine::OpenHandoff;
use axum::extract::{Path, Query, State};
use axum::Json;
use handoff_store::{AssignmentHistoryEntry, Handoff, HandoffStatus};
use serde::Deserialize;

use crate::error::{ApiError, Result};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHandoffRequest {
    pub bot_id: String,
    pub conversation_id: String,
    pub comment: Option<String>,
    /// Last-message snapshot supplied by the messaging glue.
    pub preview: Option<String>,
}

/// `POST /handoffs`: a conversation needs a human.
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateHandoffRequest>,
) -> Result<Json<Handoff>> {
    let handoff = state
        .engine
        .open_handoff(OpenHandoff {
            bot_id: &body.bot_id,
            conversation_id: &body.conversation_id,
            comment: body.comment.as_deref(),
            preview: body.preview.as_deref(),
        })
        .await?;
    Ok(Json(handoff))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub bot_id: String,
    pub status: Option<String>,
}

/// `GET /handoffs?botId=&status=`
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Handoff>>> {
    let status = query
        .status
        .as_deref()
        .map(|s| s.parse::<HandoffStatus>())
        .transpose()
        .map_err(ApiError::BadRequest)?;

    let handoffs = state.engine.list(&query.bot_id, status).await?;
    Ok(Json(handoffs))
}

/// `GET /handoffs/:id`
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Handoff>> {
    Ok(Json(state.engine.get(&id).await?))
}

/// `GET /handoffs/:id/history`: audit export, oldest entry first.
pub async fn history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<AssignmentHistoryEntry>>> {
    Ok(Json(state.engine.history(&id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub agent_id: String,
    pub acting_agent_id: String,
}

/// `POST /handoffs/:id/assign`
pub async fn assign(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AssignRequest>,
) -> Result<Json<Handoff>> {
    let handoff = state
        .engine
        .assign(&id, &body.agent_id, &body.acting_agent_id)
        .await?;
    Ok(Json(handoff))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActingAgentRequest {
    pub acting_agent_id: String,
}

/// `POST /handoffs/:id/unassign`
pub async fn unassign(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActingAgentRequest>,
) -> Result<Json<Handoff>> {
    let handoff = state.engine.unassign(&id, &body.acting_agent_id).await?;
    Ok(Json(handoff))
}

/// `POST /handoffs/:id/resolve`
pub async fn resolve(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActingAgentRequest>,
) -> Result<Json<Handoff>> {
    let handoff = state.engine.resolve(&id, &body.acting_agent_id).await?;
    Ok(Json(handoff))
}

/// `POST /handoffs/:id/hold`
pub async fn hold(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Handoff>> {
    Ok(Json(state.engine.hold(&id).await?))
}

/// `POST /handoffs/:id/release`
pub async fn release(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Handoff>> {
    Ok(Json(state.engine.release(&id).await?))
}
