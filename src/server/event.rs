//! Webhook ingestion endpoint.
//!
//! Authenticates the delivery, classifies it and applies the decision
//! (dispatch or cache eviction) before answering. Every accepted delivery
//! gets a 202, processed or ignored; the decision is only visible in the
//! audit log line.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, info};

use super::AppState;
use super::auth::{AuthError, authenticate};
use crate::cache::CacheError;
use crate::dispatch::DispatchError;
use crate::subscription::SubscriptionError;
use crate::types::{DeliveryId, Subscription};
use crate::webhooks::{ClassifyInput, Decision, EventPayload, EventType, PayloadError, classify};

/// Header name for GitHub event type.
pub const HEADER_EVENT: &str = "x-github-event";
/// Header name for GitHub delivery ID.
pub const HEADER_DELIVERY: &str = "x-github-delivery";

/// Errors that can occur when processing a webhook.
#[derive(Debug, Error)]
pub enum EventError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("invalid JSON body: {0}")]
    InvalidJson(serde_json::Error),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("cache eviction failed: {0}")]
    Cache(#[from] CacheError),
}

impl IntoResponse for EventError {
    fn into_response(self) -> Response {
        let status = match self {
            EventError::Auth(e) => return e.into_response(),
            EventError::MissingHeader(_) | EventError::InvalidJson(_) | EventError::Payload(_) => {
                StatusCode::BAD_REQUEST
            }
            EventError::Subscription(_) | EventError::Dispatch(_) | EventError::Cache(_) => {
                error!(error = %self, "Event processing failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, self.to_string()).into_response()
    }
}

/// Extracts a required header value as a string.
pub(super) fn get_header(headers: &HeaderMap, name: &'static str) -> Result<String, EventError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .ok_or(EventError::MissingHeader(name))
}

pub(super) fn delivery_id(headers: &HeaderMap) -> DeliveryId {
    headers
        .get(HEADER_DELIVERY)
        .and_then(|v| v.to_str().ok())
        .map(DeliveryId::new)
        .unwrap_or_else(DeliveryId::unknown)
}

/// Webhook handler.
///
/// # Response
///
/// - 202 Accepted: delivery classified (and dispatched or evicted if needed)
/// - 400 Bad Request: missing event header, invalid JSON, no installation
/// - 403 Forbidden: signature missing, malformed or wrong
/// - 500 Internal Server Error: subscription, cache or queue backend failure
pub async fn event_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, EventError> {
    authenticate(&headers, &body, app_state.webhook_secret())?;

    let event_type = EventType::from(get_header(&headers, HEADER_EVENT)?);
    let delivery_id = delivery_id(&headers);

    let raw: serde_json::Value = serde_json::from_slice(&body).map_err(EventError::InvalidJson)?;
    let payload = EventPayload::parse(&raw)?;

    let subscription = app_state
        .subscriptions()
        .get(payload.installation.id)
        .await?;

    let decision = classify(&ClassifyInput {
        event_type: &event_type,
        payload: &payload,
        raw: &raw,
        subscription: &subscription,
    });

    info!(
        installation_id = %payload.installation.id,
        repo = %payload.subject(),
        event_type = %event_type,
        delivery_id = %delivery_id,
        action = %decision,
        "Received event"
    );

    apply(&app_state, &subscription, decision).await?;

    Ok(StatusCode::ACCEPTED)
}

async fn apply(
    app_state: &AppState,
    subscription: &Subscription,
    decision: Decision,
) -> Result<(), EventError> {
    match decision {
        Decision::Ignored(_) => {}
        Decision::Dispatch(items) => {
            for item in items {
                app_state.dispatcher().dispatch(subscription, item).await?;
            }
        }
        Decision::Invalidate(keys) => {
            for key in &keys {
                app_state.invalidator().invalidate(key).await?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_header_present() {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_EVENT, "pull_request".parse().unwrap());

        let result = get_header(&headers, HEADER_EVENT).unwrap();
        assert_eq!(result, "pull_request");
    }

    #[test]
    fn get_header_missing() {
        let result = get_header(&HeaderMap::new(), HEADER_EVENT);
        assert!(matches!(result, Err(EventError::MissingHeader(_))));
    }

    #[test]
    fn missing_delivery_id_is_placeholder() {
        assert_eq!(delivery_id(&HeaderMap::new()).as_str(), "-");

        let mut headers = HeaderMap::new();
        headers.insert(HEADER_DELIVERY, "abc-123".parse().unwrap());
        assert_eq!(delivery_id(&headers).as_str(), "abc-123");
    }

    #[test]
    fn client_errors_are_400() {
        let err = EventError::MissingHeader(HEADER_EVENT);
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);

        let bad_json = serde_json::from_slice::<serde_json::Value>(b"{").unwrap_err();
        let err = EventError::InvalidJson(bad_json);
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
