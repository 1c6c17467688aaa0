use crate::error::MatchmakingError;
use crate::gateway::extract::AuthenticatedPlayer;
use crate::gateway::protocol::{
    ErrorResponse, JoinQuery, LoginQuery, MessageResponse, QueueResponse, RootResponse,
    StatusResponse, DROP_MESSAGE,
};
use crate::gateway::state::GatewayState;
use crate::service::health::{HealthCheck, HealthStatus};
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use prometheus::{Encoder, TextEncoder};
use tracing::{debug, error, info};

pub async fn root(State(state): State<GatewayState>) -> Json<RootResponse> {
    Json(RootResponse {
        status: "ok",
        last_job: state
            .matchmaker
            .since_last_tick()
            .map(|d| d.as_millis() as u64),
    })
}

pub async fn login(
    State(state): State<GatewayState>,
    Query(query): Query<LoginQuery>,
) -> Result<Response, MatchmakingError> {
    let Some(raw) = query.id.filter(|id| !id.is_empty()) else {
        return Ok((StatusCode::BAD_REQUEST, Json(ErrorResponse::new("missing id"))).into_response());
    };

    let grant = state.identity.login(&raw)?;
    info!("Issued token for player {}", grant.id);
    Ok(Json(grant).into_response())
}

pub async fn status(AuthenticatedPlayer(claims): AuthenticatedPlayer) -> Json<StatusResponse> {
    Json(StatusResponse { user: claims })
}

pub async fn join(
    State(state): State<GatewayState>,
    AuthenticatedPlayer(claims): AuthenticatedPlayer,
    Query(query): Query<JoinQuery>,
) -> Result<Json<QueueResponse>, MatchmakingError> {
    let status = state
        .engine
        .join(&claims.id, query.criteria.as_deref())
        .await?;
    Ok(Json(status.into()))
}

pub async fn poll(
    State(state): State<GatewayState>,
    AuthenticatedPlayer(claims): AuthenticatedPlayer,
) -> Result<Json<QueueResponse>, MatchmakingError> {
    let status = state.engine.poll(&claims.id).await?;
    Ok(Json(status.into()))
}

pub async fn drop_player(
    State(state): State<GatewayState>,
    AuthenticatedPlayer(claims): AuthenticatedPlayer,
) -> Result<Json<MessageResponse>, MatchmakingError> {
    state.engine.drop_player(&claims.id).await?;
    Ok(Json(MessageResponse {
        message: DROP_MESSAGE.to_string(),
    }))
}

pub async fn health(State(state): State<GatewayState>) -> Response {
    debug!("Health check requested");

    let health = HealthCheck::check(
        &state.service_name,
        state.store.as_ref(),
        &state.matchmaker,
        state.scheduler_interval,
    )
    .await;

    state.metrics.update_health_status(health.status.as_gauge());
    for check in &health.checks {
        state
            .metrics
            .update_component_health(&check.name, check.status != HealthStatus::Unhealthy);
    }

    let code = match health.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (code, Json(health)).into_response()
}

pub async fn metrics(State(state): State<GatewayState>) -> Response {
    let metric_families = state.metrics.registry().gather();
    let encoder = TextEncoder::new();

    match encoder.encode_to_string(&metric_families) {
        Ok(output) => {
            debug!("Serving {} metric families", metric_families.len());
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, encoder.format_type().to_string())],
                output,
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics".to_string(),
            )
                .into_response()
        }
    }
}
