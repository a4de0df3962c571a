//! Rendering of cached status messages.
//!
//! Workers store long check-run explanations in the `status` hash; GitHub
//! links to this page to show them. Not authenticated.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use tracing::error;

use super::AppState;
use crate::cache::keys::STATUS_HASH;

pub async fn status_msg_handler(
    State(app_state): State<AppState>,
    Path(key): Path<String>,
) -> Response {
    match app_state.cache().hget(STATUS_HASH, &key).await {
        Ok(Some(msg)) if !msg.is_empty() => Html(render(&msg)).into_response(),
        Ok(_) => (StatusCode::NOT_FOUND, "Not found").into_response(),
        Err(e) => {
            error!(key = %key, error = %e, "Failed to read status message");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

fn render(msg: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Status</title></head>\n\
         <body><pre>{}</pre></body>\n</html>\n",
        escape_html(msg)
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}
