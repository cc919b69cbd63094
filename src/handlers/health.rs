use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

use super::AppState;

/// Health check endpoint
/// Returns 200 OK if the process is serving
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({
        "status": "healthy",
        "service": "cephrgw-exporter",
        "version": env!("CARGO_PKG_VERSION"),
    })))
}

/// Readiness check endpoint
/// Returns 200 OK once a snapshot has been published, 503 before
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.registry.current() {
        Some(snapshot) => (StatusCode::OK, Json(json!({
            "status": "ready",
            "service": "cephrgw-exporter",
            "snapshot_completed_at": snapshot.completed_at.to_rfc3339(),
            "snapshot_age_seconds": snapshot.age().num_seconds(),
            "buckets": snapshot.buckets.len(),
            "users": snapshot.users.len(),
            "user_quotas": snapshot.user_quotas.len(),
            "bucket_quotas": snapshot.bucket_quotas.len(),
        }))),
        None => (StatusCode::SERVICE_UNAVAILABLE, Json(json!({
            "status": "waiting_for_first_snapshot",
            "service": "cephrgw-exporter",
        }))),
    }
}
