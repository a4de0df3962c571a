//! Event capture for recording test fixtures.
//!
//! `POST` records a delivery, `GET` returns and clears everything recorded,
//! `DELETE` clears without returning.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use super::AppState;
use super::auth::{AuthError, authenticate};
use super::event::{HEADER_DELIVERY, HEADER_EVENT};
use crate::cache::CacheError;
use crate::cache::keys::EVENTS_TESTING_LIST;

/// One recorded delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub payload: Value,
}

#[derive(Debug, Error)]
pub enum EventsTestingError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("invalid JSON body: {0}")]
    InvalidJson(serde_json::Error),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl IntoResponse for EventsTestingError {
    fn into_response(self) -> Response {
        let status = match self {
            EventsTestingError::Auth(e) => return e.into_response(),
            EventsTestingError::InvalidJson(_) => StatusCode::BAD_REQUEST,
            EventsTestingError::Cache(_) => {
                error!(error = %self, "Event capture failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub async fn record_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, EventsTestingError> {
    authenticate(&headers, &body, app_state.webhook_secret())?;

    let payload: Value = serde_json::from_slice(&body).map_err(EventsTestingError::InvalidJson)?;
    let event = RecordedEvent {
        id: header(&headers, HEADER_DELIVERY),
        event_type: header(&headers, HEADER_EVENT),
        payload,
    };

    let encoded = serde_json::to_string(&event).map_err(CacheError::from)?;
    app_state.cache().push(EVENTS_TESTING_LIST, &encoded).await?;
    debug!(id = ?event.id, event_type = ?event.event_type, "Recorded event");

    Ok(StatusCode::ACCEPTED)
}

pub async fn replay_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Vec<Value>>, EventsTestingError> {
    authenticate(&headers, &body, app_state.webhook_secret())?;

    let recorded = app_state.cache().drain(EVENTS_TESTING_LIST).await?;
    let events = recorded
        .iter()
        .map(|raw| serde_json::from_str(raw).map_err(CacheError::from))
        .collect::<Result<Vec<Value>, _>>()?;

    Ok(Json(events))
}

pub async fn clear_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, EventsTestingError> {
    authenticate(&headers, &body, app_state.webhook_secret())?;

    app_state.cache().delete(EVENTS_TESTING_LIST).await?;
    Ok(StatusCode::ACCEPTED)
}
