//! Subscription cache reset.
//!
//! Called by the billing side when a subscription changes. A newly
//! subscribed installation gets its private repositories bootstrapped;
//! public ones were handled when the app was installed.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, info};

use super::AppState;
use super::auth::{AuthError, authenticate};
use crate::dispatch::DispatchError;
use crate::queue::{RepositoryScope, WorkItem};
use crate::subscription::SubscriptionError;
use crate::types::InstallationId;

#[derive(Debug, Error)]
pub enum SubscriptionCacheError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("invalid installation id: {0:?}")]
    InvalidInstallation(String),

    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl IntoResponse for SubscriptionCacheError {
    fn into_response(self) -> Response {
        let status = match self {
            SubscriptionCacheError::Auth(e) => return e.into_response(),
            SubscriptionCacheError::InvalidInstallation(_) => StatusCode::BAD_REQUEST,
            _ => {
                error!(error = %self, "Subscription cache reset failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}

pub async fn subscription_cache_handler(
    State(app_state): State<AppState>,
    Path(installation_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), SubscriptionCacheError> {
    authenticate(&headers, &body, app_state.webhook_secret())?;

    let installation_id: InstallationId = installation_id
        .parse()
        .map_err(|_| SubscriptionCacheError::InvalidInstallation(installation_id))?;

    let subscriptions = app_state.subscriptions();
    subscriptions.evict(installation_id).await?;
    let subscription = subscriptions.get(installation_id).await?;

    if subscription.has_token() && subscription.subscribed {
        let item = WorkItem::InstallationHandler {
            installation_id,
            repositories: RepositoryScope::Private,
        };
        let queue = app_state.dispatcher().dispatch(&subscription, item).await?;
        info!(%installation_id, queue = %queue, "Bootstrapping private repositories");
    }

    Ok((StatusCode::OK, "Cache cleaned"))
}
