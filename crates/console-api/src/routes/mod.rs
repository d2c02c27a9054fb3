//! Route handlers for the console API.

pub mod agents;
pub mod handoffs;
pub mod health;
pub mod stats;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(health::health))
        // Agent directory
        .route("/agents", get(agents::list).post(agents::upsert))
        .route("/agents/:id/presence", post(agents::set_presence))
        .route("/agents/:id/reassignAll", post(agents::reassign_all))
        // Handoffs
        .route("/handoffs", get(handoffs::list).post(handoffs::create))
        .route("/handoffs/:id", get(handoffs::get_one))
        .route("/handoffs/:id/history", get(handoffs::history))
        .route("/handoffs/:id/assign", post(handoffs::assign))
        .route("/handoffs/:id/unassign", post(handoffs::unassign))
        .route("/handoffs/:id/resolve", post(handoffs::resolve))
        .route("/handoffs/:id/hold", post(handoffs::hold))
        .route("/handoffs/:id/release", post(handoffs::release))
        // Dashboard counters
        .route("/stats", get(stats::stats))
}
