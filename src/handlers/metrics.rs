use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};

use super::AppState;
use crate::exposition;

/// Handle /metrics endpoint
///
/// Renders the snapshot current at request time. Before the first publish
/// only the self-metrics are returned; the status is 200 either way.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let mut body = String::new();

    if let Some(snapshot) = state.registry.current() {
        exposition::render_into(&mut body, &snapshot);
    }
    if let Some(handle) = &state.self_metrics {
        body.push_str(&handle.render());
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, exposition::CONTENT_TYPE)],
        body,
    )
}
