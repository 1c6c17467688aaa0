//! Parlor Queue - pairwise matchmaking queue
//!
//! Players join a shared queue through an authenticated HTTP gateway, poll
//! to stay alive, and are paired with a compatible partner by a periodic
//! matchmaker sweep. Queue state lives in a [`store::PlayerStore`], either
//! in memory or in Redis.

pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod matchmaker;
pub mod metrics;
pub mod queue;
pub mod service;
pub mod store;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result, StoreError};
pub use types::*;

// Re-export key components
pub use matchmaker::{Matchmaker, MatchmakerScheduler, TickOutcome, TickReport};
pub use queue::{EngineContext, QueueEngine, QueueStatus};
pub use store::{InMemoryPlayerStore, PlayerStore, RedisPlayerStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
