//! Application state shared across handlers.

use assignment_engine::{AgentDirectory, AssignmentEngine, StatsAggregator};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Assignment state machine.
    pub engine: AssignmentEngine,
    /// Agent directory.
    pub directory: AgentDirectory,
    /// Dashboard counters.
    pub stats: StatsAggregator,
}

impl AppState {
    /// Create new application state.
    pub fn new(
        engine: AssignmentEngine,
        directory: AgentDirectory,
        stats: StatsAggregator,
    ) -> Self {
        Self {
            engine,
            directory,
            stats,
        }
    }
}
