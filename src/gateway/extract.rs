use crate::auth::Claims;
use crate::error::MatchmakingError;
use crate::gateway::protocol::TokenQuery;
use crate::gateway::state::GatewayState;
use axum::extract::{FromRequestParts, Query};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

/// Verified claims of the caller.
///
/// The token is taken from `Authorization: Bearer <token>`, falling back to
/// the `access_token` query parameter.
#[derive(Debug, Clone)]
pub struct AuthenticatedPlayer(pub Claims);

impl FromRequestParts<GatewayState> for AuthenticatedPlayer {
    type Rejection = MatchmakingError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &GatewayState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| MatchmakingError::unauthorized("missing access token"))?;
        let claims = state.identity.verify(&token)?;
        Ok(AuthenticatedPlayer(claims))
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let from_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    if let Some(token) = from_header {
        return Some(token.to_string());
    }

    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(query)| query.access_token)
        .filter(|token| !token.is_empty())
}
