//! Agent directory facade.
//!
//! Agents are created and refreshed externally on login/logout; the engine
//! only reads presence and role. Presence changes are announced on the
//! bot's topic, but the directory never triggers reassignment itself; the
//! glue layer above decides when to call
//! [`crate::AssignmentEngine::reassign_all`].

use handoff_store::{agent, time, Agent, AgentRole, Store};
use realtime_bus::{Broadcaster, Event};
use tracing::info;

use crate::error::Result;

pub use handoff_store::agent::NewAgent;

/// Directory of human agents known to a bot's console.
#[derive(Clone)]
pub struct AgentDirectory {
    store: Store,
    bus: Broadcaster,
}

impl AgentDirectory {
    pub fn new(store: Store, bus: Broadcaster) -> Self {
        Self { store, bus }
    }

    /// All agents for a bot, supervisors first.
    pub async fn list_agents(&self, bot_id: &str) -> Result<Vec<Agent>> {
        Ok(agent::list_agents(self.store.pool(), bot_id).await?)
    }

    /// Register an agent, or refresh display attributes and role on login.
    pub async fn upsert_agent(&self, new: &NewAgent<'_>) -> Result<Agent> {
        let updated = agent::upsert_agent(self.store.pool(), new, &time::now()).await?;
        info!(agent_id = %new.id, bot_id = %new.bot_id, "agent upserted");
        Ok(updated)
    }

    /// Update an agent's presence and announce it on the bot topic.
    pub async fn set_online(&self, agent_id: &str, online: bool) -> Result<Agent> {
        let updated = agent::set_online(self.store.pool(), agent_id, online, &time::now()).await?;

        self.bus
            .publish(&updated.bot_id, Event::agent_status_changed(&updated));
        info!(agent_id = %agent_id, online, "agent presence changed");
        Ok(updated)
    }

    /// An agent's role.
    pub async fn role(&self, agent_id: &str) -> Result<AgentRole> {
        let found = agent::get_agent(self.store.pool(), agent_id).await?;
        Ok(found.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    async fn test_directory() -> AgentDirectory {
        let store = Store::connect_with_pool_size("sqlite::memory:", 1)
            .await
            .unwrap();
        store.migrate().await.unwrap();
        AgentDirectory::new(store, Broadcaster::default())
    }

    #[tokio::test]
    async fn test_presence_change_is_announced() {
        let directory = test_directory().await;
        directory
            .upsert_agent(&NewAgent {
                id: "agent-1",
                bot_id: "bot-1",
                name: "Alice",
                email: None,
                role: AgentRole::Supervisor,
            })
            .await
            .unwrap();

        let mut sub = directory.bus.subscribe("bot-1");
        let updated = directory.set_online("agent-1", true).await.unwrap();
        assert!(updated.online);

        let event = sub.recv().await.unwrap();
        assert_eq!(event.resource, "agent");
        assert_eq!(event.kind, "statusChanged");
        assert_eq!(event.payload["id"], "agent-1");
        assert_eq!(event.payload["online"], true);

        assert_eq!(directory.role("agent-1").await.unwrap(), AgentRole::Supervisor);
    }

    #[tokio::test]
    async fn test_unknown_agent_is_not_found() {
        let directory = test_directory().await;
        let result = directory.set_online("ghost", true).await;
        assert!(matches!(result, Err(EngineError::NotFound { .. })));
    }
}
