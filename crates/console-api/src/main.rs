//! HTTP surface for the handoff assignment core.
//!
//! Thin JSON layer over the assignment engine, agent directory, and stats
//! aggregator. Realtime fan-out is a library concern: the transport layer
//! embedding this service subscribes to the bus directly.

mod config;
mod error;
mod routes;
mod state;

use assignment_engine::{AgentDirectory, AssignmentEngine, StatsAggregator};
use handoff_store::Store;
use realtime_bus::Broadcaster;
use tracing::info;

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;
    info!(addr = %config.addr, "Starting console API server");

    // Connect to the store
    let store = Store::connect(&config.database_url).await?;
    store.migrate().await?;

    // Build the core
    let bus = Broadcaster::new(config.topic_capacity);
    let engine = AssignmentEngine::new(store.clone(), bus.clone());
    let directory = AgentDirectory::new(store.clone(), bus.clone());
    let stats = StatsAggregator::new(store);

    // Build application state
    let state = AppState::new(engine, directory, stats);

    // Build router
    let app = routes::router().with_state(state);

    // Start server
    info!(addr = %config.addr, "Console API listening");
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
