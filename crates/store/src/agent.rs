//! Agent directory persistence.

use sqlx::SqlitePool;

use crate::error::{Result, StoreError};
use crate::models::{Agent, AgentRole};

/// Parameters for registering or refreshing an agent on login.
#[derive(Debug, Clone, Copy)]
pub struct NewAgent<'a> {
    /// Externally authenticated identity.
    pub id: &'a str,
    /// Bot whose console this agent works.
    pub bot_id: &'a str,
    /// Display name.
    pub name: &'a str,
    /// Contact email, if known.
    pub email: Option<&'a str>,
    /// Role granted to this agent.
    pub role: AgentRole,
}

const AGENT_COLUMNS: &str = "id, bot_id, name, email, role, online, created_at, updated_at";

/// Create an agent, or refresh its display attributes and role if it already
/// exists. Presence is not touched by the upsert.
pub async fn upsert_agent(pool: &SqlitePool, new: &NewAgent<'_>, now: &str) -> Result<Agent> {
    sqlx::query(
        r#"
        INSERT INTO agents (id, bot_id, name, email, role, online, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 0, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            bot_id = excluded.bot_id,
            name = excluded.name,
            email = excluded.email,
            role = excluded.role,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(new.id)
    .bind(new.bot_id)
    .bind(new.name)
    .bind(new.email)
    .bind(new.role)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    get_agent(pool, new.id).await
}

/// Get an agent by id.
pub async fn get_agent(pool: &SqlitePool, id: &str) -> Result<Agent> {
    let agent = sqlx::query_as::<_, Agent>(&format!(
        "SELECT {AGENT_COLUMNS} FROM agents WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    agent.ok_or_else(|| StoreError::NotFound {
        entity: "Agent",
        id: id.to_string(),
    })
}

/// List all agents for a bot, supervisors first.
pub async fn list_agents(pool: &SqlitePool, bot_id: &str) -> Result<Vec<Agent>> {
    let agents = sqlx::query_as::<_, Agent>(&format!(
        r#"
        SELECT {AGENT_COLUMNS}
        FROM agents
        WHERE bot_id = ?
        ORDER BY role DESC, name ASC
        "#
    ))
    .bind(bot_id)
    .fetch_all(pool)
    .await?;

    Ok(agents)
}

/// Update an agent's presence.
pub async fn set_online(pool: &SqlitePool, id: &str, online: bool, now: &str) -> Result<Agent> {
    let result = sqlx::query(
        r#"
        UPDATE agents
        SET online = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(online)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound {
            entity: "Agent",
            id: id.to_string(),
        });
    }

    get_agent(pool, id).await
}
