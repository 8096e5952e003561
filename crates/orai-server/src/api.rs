use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

const DEFAULT_TAKE: u64 = 50;
const MAX_TAKE: u64 = 200;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/alerts/digest/run-now", post(run_digest_now))
        .route("/api/alerts/deliveries", get(list_deliveries))
        .route("/api/alerts/stats", get(stats))
        .with_state(state)
        .layer(cors)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "uptime_secs": (Utc::now() - state.start_time).num_seconds(),
    }))
}

/// Synchronous manual digest run; the caller gets the sent count back for
/// UI feedback. Overlap with the periodic digest loop is safe (pending-only
/// row transitions).
async fn run_digest_now(State(state): State<AppState>) -> impl IntoResponse {
    match state.digest.process_digests(true).await {
        Ok(sent) => (StatusCode::OK, Json(json!({ "sent": sent }))).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Manual digest run failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Digest run failed" })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeliveriesParams {
    take: Option<u64>,
}

// Auth is handled upstream; this layer trusts the forwarded user id.
fn user_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

async fn list_deliveries(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<DeliveriesParams>,
) -> impl IntoResponse {
    let Some(user_id) = user_id_from_headers(&headers) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing x-user-id header" })),
        )
            .into_response();
    };

    let take = params.take.unwrap_or(DEFAULT_TAKE).clamp(1, MAX_TAKE);
    match state
        .store
        .list_recent_deliveries_for_user(&user_id, take)
        .await
    {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => {
            tracing::error!(user_id = %user_id, error = %e, "Failed to list deliveries");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Database error" })),
            )
                .into_response()
        }
    }
}

async fn stats(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let Some(user_id) = user_id_from_headers(&headers) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing x-user-id header" })),
        )
            .into_response();
    };

    match state.store.rule_stats_for_user(&user_id).await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => {
            tracing::error!(user_id = %user_id, error = %e, "Failed to compute rule stats");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Database error" })),
            )
                .into_response()
        }
    }
}
