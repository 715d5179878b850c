//! Lifelog Gateway - unified life-journaling service
//!
//! One process fronting a set of journaling domain stores (dreams, emotions,
//! memories, gratitude, quests, achievements) with:
//! - Dual-backend persistence (embedded SQLite + flat-file JSON mirrors)
//! - A cross-event bus feeding chat notifications
//! - Sandboxed Rhai plugins that read state and propose actions
//! - A metrics-driven self-improvement evaluator
//! - A backup-then-apply pipeline for machine-proposed actions
//!
//! # Example
//!
//! ```ignore
//! use lifelog_gateway::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     lifelog_gateway::server::start(config).await
//! }
//! ```

// Core modules (order matters for cross-module dependencies)
pub mod types;
pub mod config;
pub mod store; // Must come before events/evolve which build on it
pub mod events;
pub mod mesh;
pub mod plugins;
pub mod evolve;
pub mod chat;
pub mod server;
pub mod cli;

// Re-export commonly used types for convenience
pub use config::Config;

pub use store::{
    profile::{ProfileService, ProfileState, RewardPacket},
    RecordStore,
};

pub use events::{CrossEvent, CrossEventBus, EventSink};

pub use plugins::{PluginManifest, PluginRegistry, PluginRun, PluginRunResult, PluginRunner};

pub use evolve::{
    actions::{Action, ActionRequest},
    evaluator::{evaluate, Evaluation, Severity, Suggestion},
};

pub use chat::command::{parse_chat_command, ChatCommand};

pub use server::{start as start_server, ServerState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get the library info
pub fn info() -> String {
    format!("{} v{} - Unified life-journaling gateway", NAME, VERSION)
}
