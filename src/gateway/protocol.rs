//! JSON bodies exchanged with clients

use crate::auth::Claims;
use crate::error::MatchmakingError;
use crate::queue::QueueStatus;
use crate::types::{Millis, Player};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;

pub const DROP_MESSAGE: &str = "player removed from queue.";

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JoinQuery {
    pub criteria: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub access_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub user: Claims,
}

/// A player record as returned to its owner
#[derive(Debug, Serialize)]
pub struct PlayerView {
    #[serde(flatten)]
    pub player: Player,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_since_last_seen: Option<Millis>,
}

#[derive(Debug, Serialize)]
pub struct QueueResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player: Option<PlayerView>,
    pub state: &'static str,
    pub state_code: u8,
}

impl From<QueueStatus> for QueueResponse {
    fn from(status: QueueStatus) -> Self {
        let time_since_last_seen = status.time_since_last_seen;
        Self {
            player: status.player.map(|player| PlayerView {
                player,
                time_since_last_seen,
            }),
            state: status.state.message(),
            state_code: status.state.code(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub status: &'static str,
    /// Milliseconds since the last sweep started
    #[serde(rename = "last-job")]
    pub last_job: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

impl MatchmakingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            MatchmakingError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            MatchmakingError::PlayerNotFound { .. } => StatusCode::NOT_FOUND,
            MatchmakingError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            MatchmakingError::ConfigurationError { .. }
            | MatchmakingError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for MatchmakingError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}
