//! Error types for the matchmaking queue
//!
//! Library operations return typed errors so the gateway can map each kind
//! to a structured response. Binary and service wiring use anyhow.

use crate::types::PlayerId;

/// Result type alias for queue operations
pub type Result<T> = std::result::Result<T, MatchmakingError>;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures reported by a player store backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Version conflict for player {player_id}")]
    Conflict { player_id: PlayerId },

    #[error("Corrupt record for player {player_id}: {message}")]
    Corrupt { player_id: PlayerId, message: String },
}

/// Errors surfaced by the queue engine, identity provider and gateway
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("Player not found: {player_id}")]
    PlayerNotFound { player_id: PlayerId },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl MatchmakingError {
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        MatchmakingError::Unauthorized {
            reason: reason.into(),
        }
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Unavailable {
            message: err.to_string(),
        }
    }
}
