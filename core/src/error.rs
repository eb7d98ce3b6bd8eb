//! Error types for the tailor API client.
//!
//! # Design
//! One enum covers every failure the core can produce. Non-2xx responses are
//! normalized into `Http` with a human-readable `message` taken from the
//! response body when the server sent one. Client-side validation failures
//! get their own variant so callers can render inline field errors without
//! ever having talked to the network.

use thiserror::Error;

use crate::validate::ValidationErrors;

/// Errors returned by `ApiClient` and the resource units built on top of it.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No response was received (DNS, connect, TLS, timeout, ...).
    #[error("{0}")]
    Transport(String),

    /// The server answered with a non-2xx status.
    ///
    /// `message` is the body's `message` field when present, otherwise
    /// `HTTP error! status: <code>`.
    #[error("{message}")]
    Http { status: u16, message: String },

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// Input failed client-side checks and was never sent.
    #[error("{0}")]
    Validation(ValidationErrors),

    /// The token store could not be read or written.
    #[error("token storage failed: {0}")]
    Storage(String),

    /// The owning unit was deactivated while the call was in flight.
    #[error("request cancelled")]
    Cancelled,

    /// A resource mutation failed; wraps the underlying error.
    #[error("{message}")]
    Resource {
        message: String,
        #[source]
        source: Box<ApiError>,
    },
}

impl ApiError {
    /// Builds the normalized error for a non-2xx response.
    pub(crate) fn from_status(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| {
                value
                    .get("message")
                    .and_then(serde_json::Value::as_str)
                    .filter(|message| !message.is_empty())
                    .map(str::to_owned)
            })
            .unwrap_or_else(|| format!("HTTP error! status: {status}"));
        ApiError::Http { status, message }
    }

    /// Wraps `self` for a failed resource mutation. `fallback` is used as the
    /// message when the underlying error renders as an empty string.
    pub(crate) fn for_resource(self, fallback: &str) -> Self {
        let rendered = self.to_string();
        let message = if rendered.trim().is_empty() {
            fallback.to_string()
        } else {
            rendered
        };
        ApiError::Resource {
            message,
            source: Box::new(self),
        }
    }

    /// HTTP status of the failure, looking through `Resource` wrappers.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Resource { source, .. } => source.status(),
            _ => None,
        }
    }

    /// True for a 404 response.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Field errors when this is (or wraps) a validation failure.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            ApiError::Validation(errors) => Some(errors),
            ApiError::Resource { source, .. } => source.validation_errors(),
            _ => None,
        }
    }
}

/// Renders `err` for display, substituting `fallback` when it is blank.
pub(crate) fn message_or(err: &ApiError, fallback: &str) -> String {
    let message = err.to_string();
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}
