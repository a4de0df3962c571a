//! Source host error types.
//!
//! Only one distinction matters to callers: "not found" is a normal answer
//! for some lookups (no installation, no configuration file), everything else
//! is an upstream failure that fails the request. Nothing is retried.

use std::fmt;
use thiserror::Error;

/// An error talking to the source host.
#[derive(Debug, Error)]
pub enum HostError {
    /// The resource does not exist (HTTP 404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other API failure.
    #[error("{0}")]
    Api(ApiFailure),

    /// The app credentials could not be loaded.
    #[error("invalid app credentials: {0}")]
    Credentials(#[from] jsonwebtoken::errors::Error),

    /// The host answered with something we could not read.
    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Details of a failed API call.
#[derive(Debug)]
pub struct ApiFailure {
    /// The HTTP status code, if the host answered at all.
    pub status_code: Option<u16>,

    pub message: String,

    pub source: octocrab::Error,
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "GitHub API error (HTTP {}): {}", code, self.message),
            None => write!(f, "GitHub API error: {}", self.message),
        }
    }
}

impl HostError {
    /// Categorizes an octocrab error, mapping 404 to [`HostError::NotFound`].
    pub fn from_octocrab(context: impl Into<String>, err: octocrab::Error) -> Self {
        let context = context.into();
        let status_code = status_code(&err);

        if status_code == Some(404) {
            return HostError::NotFound(context);
        }

        HostError::Api(ApiFailure {
            status_code,
            message: format!("{context}: {err}"),
            source: err,
        })
    }
}

fn status_code(err: &octocrab::Error) -> Option<u16> {
    match err {
        octocrab::Error::GitHub { source, .. } => Some(source.status_code.as_u16()),
        _ => None,
    }
}

/// Converts a "not found" answer into `None`.
pub trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, HostError>;
}

impl<T> OptionalExt<T> for Result<T, HostError> {
    fn optional(self) -> Result<Option<T>, HostError> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(HostError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
