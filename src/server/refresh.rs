//! Refresh endpoints.
//!
//! - `POST /refresh/{owner}/{repo}/{*selector}`: one repository
//! - `POST /refresh`: every installation

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use super::AppState;
use super::auth::{AuthError, authenticate};
use crate::refresh::{RefSelector, RefreshError, RefreshOutcome, SelectorError};

#[derive(Debug, Error)]
pub enum RefreshEndpointError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Invalid ref: {0}")]
    Selector(#[from] SelectorError),

    #[error(transparent)]
    Refresh(#[from] RefreshError),
}

impl IntoResponse for RefreshEndpointError {
    fn into_response(self) -> Response {
        let status = match self {
            RefreshEndpointError::Auth(e) => return e.into_response(),
            RefreshEndpointError::Selector(_)
            | RefreshEndpointError::Refresh(RefreshError::NotInstalled { .. }) => {
                StatusCode::BAD_REQUEST
            }
            RefreshEndpointError::Refresh(_) => {
                error!(error = %self, "Refresh failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, self.to_string()).into_response()
    }
}

/// Targeted refresh. The selector is validated before any upstream call.
pub async fn refresh_handler(
    State(app_state): State<AppState>,
    Path((owner, repo, selector)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), RefreshEndpointError> {
    authenticate(&headers, &body, app_state.webhook_secret())?;

    let selector: RefSelector = selector.parse()?;

    match app_state.refresher().refresh(&owner, &repo, &selector).await? {
        RefreshOutcome::NoConfiguration => Ok((StatusCode::ACCEPTED, "No configuration")),
        RefreshOutcome::NotCovered | RefreshOutcome::Dispatched(_) => {
            Ok((StatusCode::ACCEPTED, ""))
        }
    }
}

/// Full refresh; answers with the summary text.
pub async fn refresh_all_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, String), RefreshEndpointError> {
    authenticate(&headers, &body, app_state.webhook_secret())?;

    let summary = app_state.refresher().refresh_all().await?;
    Ok((StatusCode::ACCEPTED, summary.to_string()))
}
