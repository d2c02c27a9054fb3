//! Handoff assignment core: state machine, agent directory, and stats.
//!
//! This crate coordinates who owns each escalated conversation. The
//! [`AssignmentEngine`] enforces the per-handoff state machine
//! (`pending → assigned → resolved`, with unassign back to the pool and
//! ledger-recorded reassigns), keeps the store and the append-only
//! assignment ledger consistent, and publishes every committed transition
//! on the bot's realtime topic.
//!
//! # Architecture
//!
//! ```text
//! agent session / glue
//!          ↓
//! ┌───────────────────────────────────────────────┐
//! │              ASSIGNMENT ENGINE                │
//! │                                               │
//! │  read current row → validate transition       │
//! │         ↓                                     │
//! │  version-guarded UPDATE + ledger append       │
//! │  (one transaction; loser gets a conflict)     │
//! │         ↓                                     │
//! │  publish committed event on the bot topic     │
//! └───────────────────────────────────────────────┘
//!          ↓                        ↓
//!   handoff-store (SQLite)    realtime-bus subscribers
//! ```
//!
//! Guarantees:
//!
//! - At most one owner per handoff at any instant; `assigned_agent_id` is
//!   non-null exactly when status is `assigned`.
//! - One ledger entry per accepted transition; replaying a handoff's
//!   entries reconstructs its ownership history.
//! - Events are published only after the commit, in commit order per bot
//!   topic.

pub mod conversations;
pub mod directory;
pub mod engine;
pub mod error;
pub mod stats;

pub use conversations::{ConversationError, ConversationSnapshot, Conversations};
pub use directory::AgentDirectory;
pub use engine::{AssignmentEngine, OpenHandoff, ReassignAllOutcome};
pub use error::{EngineError, Result};
pub use stats::StatsAggregator;
