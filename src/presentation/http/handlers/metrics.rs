//! Prometheus metrics endpoint

use axum::{extract::State, http::header, response::IntoResponse};

use crate::startup::AppState;

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.gather(),
    )
}
