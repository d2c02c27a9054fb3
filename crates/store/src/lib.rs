//! SQLite persistence layer for the handoff assignment core.
//!
//! This crate provides async store operations for agents, handoffs, and the
//! append-only assignment ledger using SQLx with SQLite.
//!
//! # Example
//!
//! ```no_run
//! use handoff_store::{agent, models::AgentRole, Store};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let store = Store::connect("sqlite:handover.db?mode=rwc").await?;
//!     store.migrate().await?;
//!
//!     // Register an agent
//!     let new = agent::NewAgent {
//!         id: "c27fb365-0c84-4cf2-8555-814bb065e448",
//!         bot_id: "support-bot",
//!         name: "Bob",
//!         email: None,
//!         role: AgentRole::Agent,
//!     };
//!     agent::upsert_agent(store.pool(), &new, &handoff_store::time::now()).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod error;
pub mod handoff;
pub mod history;
pub mod models;
pub mod stats;
pub mod time;

pub use error::{Result, StoreError};
pub use models::{
    ActionType, Agent, AgentRole, AssignmentHistoryEntry, Handoff, HandoffStatus,
};
pub use stats::BotStats;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Store connection wrapper.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Default pool size for store connections.
    /// Sized for many concurrent agent sessions issuing transitions.
    const DEFAULT_POOL_SIZE: u32 = 20;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `?mode=rwc` to create the database file if it doesn't exist.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    ///
    /// Note: `sqlite::memory:` gives each pooled connection its own private
    /// database, so in-memory callers must use a pool size of one.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!("Connected to store: {} (pool size: {})", url, pool_size);

        Ok(Self { pool })
    }

    /// Run store migrations.
    ///
    /// This should be called once after connecting to ensure the schema is up
    /// to date. Migrations are idempotent.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running store migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::NewAgent;

    async fn test_store() -> Store {
        // In-memory SQLite is per-connection; keep the pool at one.
        let store = Store::connect_with_pool_size("sqlite::memory:", 1)
            .await
            .unwrap();
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_agent_crud() {
        let store = test_store().await;
        let now = time::now();

        let new = NewAgent {
            id: "agent-1",
            bot_id: "bot-1",
            name: "Alice",
            email: Some("alice@example.com"),
            role: AgentRole::Agent,
        };
        let created = agent::upsert_agent(store.pool(), &new, &now).await.unwrap();
        assert_eq!(created.name, "Alice");
        assert!(!created.online);

        // Upsert refreshes display attributes and role, keeps presence.
        let online = agent::set_online(store.pool(), "agent-1", true, &time::now())
            .await
            .unwrap();
        assert!(online.online);

        let promoted = NewAgent {
            role: AgentRole::Supervisor,
            ..new
        };
        let updated = agent::upsert_agent(store.pool(), &promoted, &time::now())
            .await
            .unwrap();
        assert_eq!(updated.role, AgentRole::Supervisor);
        assert!(updated.online);

        let listed = agent::list_agents(store.pool(), "bot-1").await.unwrap();
        assert_eq!(listed.len(), 1);

        let missing = agent::get_agent(store.pool(), "nope").await;
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_agents_scoped_by_bot() {
        let store = test_store().await;
        let now = time::now();

        for (id, bot) in [("a1", "bot-1"), ("a2", "bot-1"), ("a3", "bot-2")] {
            let new = NewAgent {
                id,
                bot_id: bot,
                name: "x",
                email: None,
                role: AgentRole::Agent,
            };
            agent::upsert_agent(store.pool(), &new, &now).await.unwrap();
        }

        assert_eq!(agent::list_agents(store.pool(), "bot-1").await.unwrap().len(), 2);
        assert_eq!(agent::list_agents(store.pool(), "bot-2").await.unwrap().len(), 1);
    }
}
