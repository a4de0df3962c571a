//! Liveness probe.
//!
//! Answers without touching the cache, the queue backend or GitHub, so it
//! stays green while a collaborator is down.

use axum::http::StatusCode;

/// `GET /health`: 200 with the text "OK".
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
