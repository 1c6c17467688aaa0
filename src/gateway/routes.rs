use crate::gateway::handlers::{drop_player, health, join, login, metrics, poll, root, status};
use crate::gateway::state::GatewayState;
use axum::{routing::get, Router};

pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/login", get(login))
        .route("/status", get(status))
        .route("/queue/join", get(join))
        .route("/queue/poll", get(poll))
        .route("/queue/drop", get(drop_player))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{IdentityProvider, DEFAULT_TOKEN_TTL};
    use crate::matchmaker::Matchmaker;
    use crate::metrics::MetricsCollector;
    use crate::queue::{EngineContext, ManualClock, QueueEngine, SequentialMatchIds};
    use crate::store::InMemoryPlayerStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn build_test_state() -> GatewayState {
        let store = Arc::new(InMemoryPlayerStore::new());
        let context = Arc::new(EngineContext::new(
            Arc::new(ManualClock::starting_at(0)),
            Arc::new(SequentialMatchIds::default()),
        ));
        let metrics = Arc::new(MetricsCollector::new().expect("expected metrics collector"));

        GatewayState {
            engine: QueueEngine::new(store.clone(), context.clone()).with_metrics(metrics.clone()),
            identity: Arc::new(IdentityProvider::new("test-secret", "salt", DEFAULT_TOKEN_TTL)),
            matchmaker: Arc::new(Matchmaker::new(store.clone(), context)),
            store,
            metrics,
            service_name: "parlor-queue".to_string(),
            scheduler_interval: Duration::from_millis(3_000),
        }
    }

    async fn get_json(app: &Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut request = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = request.body(Body::empty()).expect("expected request to build");

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("expected response body");
        let payload = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, payload)
    }

    async fn login_as(app: &Router, raw: &str) -> (String, String) {
        let (status, payload) = get_json(app, &format!("/login?id={}", raw), None).await;
        assert_eq!(status, StatusCode::OK);
        (
            payload["id"].as_str().unwrap().to_string(),
            payload["token"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn when_root_is_requested_before_any_sweep_then_last_job_is_null() {
        let app = router(build_test_state());

        let (status, payload) = get_json(&app, "/", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["status"], "ok");
        assert!(payload["last-job"].is_null());
    }

    #[tokio::test]
    async fn when_login_has_no_id_then_returns_400_and_error_message() {
        let app = router(build_test_state());

        let (status, payload) = get_json(&app, "/login", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload["error"], "missing id");
    }

    #[tokio::test]
    async fn when_status_is_called_with_login_token_then_echoes_claims() {
        let app = router(build_test_state());
        let (id, token) = login_as(&app, "alice").await;

        let (status, payload) = get_json(&app, "/status", Some(&token)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["user"]["id"], id.as_str());
        assert!(payload["user"]["exp"].as_u64().is_some());
    }

    #[tokio::test]
    async fn when_token_is_missing_then_returns_401_and_error_message() {
        let app = router(build_test_state());

        let (status, payload) = get_json(&app, "/queue/poll", None).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(payload["error"].as_str().unwrap().contains("missing access token"));
    }

    #[tokio::test]
    async fn when_token_is_forged_then_returns_401() {
        let app = router(build_test_state());
        let forger = IdentityProvider::new("other-secret", "salt", DEFAULT_TOKEN_TTL);
        let token = forger.issue_token("mallory").unwrap();

        let (status, _) = get_json(&app, "/status", Some(&token)).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn when_join_uses_access_token_query_then_player_is_queued() {
        let app = router(build_test_state());
        let (id, token) = login_as(&app, "alice").await;

        let (status, payload) = get_json(
            &app,
            &format!("/queue/join?criteria=ranked&access_token={}", token),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["state"], "in queue.");
        assert_eq!(payload["state_code"], 1);
        assert_eq!(payload["player"]["id"], id.as_str());
        assert_eq!(payload["player"]["criteria"], "ranked");
        assert_eq!(payload["player"]["matched"], false);
    }

    #[tokio::test]
    async fn when_two_ranked_players_are_swept_then_both_poll_matched() {
        let state = build_test_state();
        let app = router(state.clone());
        let (_, alice) = login_as(&app, "alice").await;
        let (_, bob) = login_as(&app, "bob").await;

        let (_, joined) = get_json(&app, "/queue/join?criteria=ranked", Some(&alice)).await;
        assert_eq!(joined["state"], "in queue.");
        let (_, joined) = get_json(&app, "/queue/join?criteria=ranked", Some(&bob)).await;
        assert_eq!(joined["state"], "in queue.");

        state.matchmaker.run_tick().await.unwrap();

        let (_, alice_poll) = get_json(&app, "/queue/poll", Some(&alice)).await;
        let (_, bob_poll) = get_json(&app, "/queue/poll", Some(&bob)).await;
        assert_eq!(alice_poll["state"], "matched in queue.");
        assert_eq!(bob_poll["state"], "matched in queue.");
        assert_eq!(alice_poll["player"]["match"]["id"], bob_poll["player"]["match"]["id"]);
        assert!(alice_poll["player"]["time_since_last_seen"].as_u64().is_some());

        let (_, root) = get_json(&app, "/", None).await;
        assert!(root["last-job"].as_u64().is_some());
    }

    #[tokio::test]
    async fn when_poll_has_no_record_then_reports_not_in_queue() {
        let app = router(build_test_state());
        let (_, token) = login_as(&app, "alice").await;

        let (status, payload) = get_json(&app, "/queue/poll", Some(&token)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["state"], "not in queue.");
        assert_eq!(payload["state_code"], 0);
        assert!(payload.get("player").is_none());
    }

    #[tokio::test]
    async fn when_drop_is_called_then_player_leaves_and_second_drop_is_404() {
        let app = router(build_test_state());
        let (_, token) = login_as(&app, "alice").await;
        get_json(&app, "/queue/join", Some(&token)).await;

        let (status, payload) = get_json(&app, "/queue/drop", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["message"], "player removed from queue.");

        let (status, payload) = get_json(&app, "/queue/drop", Some(&token)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(payload["error"].is_string());
    }

    #[tokio::test]
    async fn when_health_is_requested_then_reports_components() {
        let app = router(build_test_state());

        let (status, payload) = get_json(&app, "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["status"], "healthy");
        assert_eq!(payload["checks"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn when_metrics_are_requested_then_returns_prometheus_text() {
        let app = router(build_test_state());
        let (_, token) = login_as(&app, "alice").await;
        get_json(&app, "/queue/join", Some(&token)).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .expect("expected request to build"),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("parlor_queue_operations_total"));
    }

    #[tokio::test]
    async fn when_route_does_not_exist_then_returns_404() {
        let app = router(build_test_state());

        let (status, _) = get_json(&app, "/queue/unknown", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
