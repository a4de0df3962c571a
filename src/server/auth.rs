//! Request authentication.
//!
//! Every mutating endpoint checks the `X-Hub-Signature` header against the
//! raw body before doing anything else. Any failure is a 403.

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::warn;

use crate::webhooks::{SignatureError, verify_signature};

/// Header name for GitHub signature.
pub const HEADER_SIGNATURE: &str = "x-hub-signature";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("webhook without signature")]
    MissingSignature,

    #[error(transparent)]
    Signature(#[from] SignatureError),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (StatusCode::FORBIDDEN, "Forbidden").into_response()
    }
}

/// Verifies the request signature.
pub fn authenticate(headers: &HeaderMap, body: &[u8], secret: &[u8]) -> Result<(), AuthError> {
    let Some(header) = headers.get(HEADER_SIGNATURE) else {
        warn!("Webhook without signature");
        return Err(AuthError::MissingSignature);
    };

    // A non-ASCII header value cannot be `sha1=<hex>`.
    let header = header.to_str().map_err(|_| {
        warn!(kind = "malformed", "Rejected webhook signature");
        AuthError::Signature(SignatureError::Malformed)
    })?;

    verify_signature(body, header, secret).map_err(|e| {
        warn!(kind = ?e, "Rejected webhook signature: {e}");
        AuthError::from(e)
    })
}
