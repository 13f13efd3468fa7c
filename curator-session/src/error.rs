//! Error taxonomy for the session core.
//!
//! Every failure crosses component boundaries as a [`SessionError`], so a
//! caller can always tell "not authenticated" (no user in the session state)
//! apart from "the request failed".

use reqwest::StatusCode;
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

/// Message shown when a response body carries nothing usable.
pub const DEFAULT_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

/// Message shown for transport failures.
pub const NETWORK_ERROR_MESSAGE: &str = "Unable to connect to server";

/// Result alias used throughout the session core.
pub type SessionResult<T> = Result<T, SessionError>;

/// Failures of the token persistence medium.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("token storage I/O failed at {path}: {source}")]
    Io {
        /// Location of the token file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The backing file exists but does not hold a token document.
    #[error("token storage at {path} is corrupt: {message}")]
    Corrupt {
        /// Location of the token file.
        path: PathBuf,
        /// Decoder message.
        message: String,
    },

    /// The medium cannot be used at all.
    #[error("token storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by the API client and the session manager.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The request never reached the server or timed out.
    #[error("network error: {source}")]
    Network {
        /// Transport failure reported by `reqwest`.
        #[source]
        source: reqwest::Error,
    },

    /// A token-bearing request was rejected and the refresh did not recover it.
    #[error("authentication failed: {message}")]
    Authentication {
        /// Message for the user.
        message: String,
    },

    /// The server rejected the request (4xx) with a usable message.
    #[error("request rejected ({status}): {message}")]
    Validation {
        /// HTTP status of the rejection.
        status: StatusCode,
        /// Message for the user.
        message: String,
    },

    /// Any other non-success response.
    #[error("server error ({status}): {message}")]
    Api {
        /// HTTP status of the failure.
        status: StatusCode,
        /// Message for the user.
        message: String,
    },

    /// A success response whose body could not be decoded.
    #[error("unexpected response body: {0}")]
    Decode(String),

    /// The request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The token store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The operation was cancelled or superseded before it could apply.
    #[error("operation cancelled")]
    Cancelled,
}

impl SessionError {
    /// Classify a `reqwest` failure that happened before a status was available.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if err.is_builder() {
            Self::InvalidRequest(err.to_string())
        } else {
            Self::Network { source: err }
        }
    }

    /// Map a non-success status and its body to the matching variant.
    ///
    /// `carried_token` is true when the rejected request had an access token
    /// attached; only then is a 401 an authentication failure.
    pub(crate) fn from_status(status: StatusCode, body: &[u8], carried_token: bool) -> Self {
        let message = extract_error_message(body).unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string());
        if status == StatusCode::UNAUTHORIZED && carried_token {
            Self::Authentication { message }
        } else if status.is_client_error() {
            Self::Validation { status, message }
        } else {
            Self::Api { status, message }
        }
    }

    /// HTTP status attached to the failure, when there is one.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Authentication { .. } => Some(StatusCode::UNAUTHORIZED),
            Self::Validation { status, .. } | Self::Api { status, .. } => Some(*status),
            Self::Network { source } => source.status(),
            _ => None,
        }
    }

    /// Text suitable for showing to a user verbatim.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Authentication { message }
            | Self::Validation { message, .. }
            | Self::Api { message, .. } => message.clone(),
            Self::Network { .. } => NETWORK_ERROR_MESSAGE.to_string(),
            Self::Decode(_) | Self::InvalidRequest(_) => DEFAULT_ERROR_MESSAGE.to_string(),
            Self::Storage(err) => err.to_string(),
            Self::Cancelled => "Request cancelled".to_string(),
        }
    }

    /// True for terminal authentication failures the UI should answer with a logout.
    #[must_use]
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }
}

/// Pull a human-readable message out of an error response body.
///
/// Looks at `detail`, then `message`, then the first field error (a string,
/// or the first string of a list). Returns `None` for bodies that are not JSON
/// or hold no string at all.
#[must_use]
pub fn extract_error_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    match value {
        Value::Object(map) => ["detail", "message"]
            .iter()
            .find_map(|key| map.get(*key).and_then(first_message))
            .or_else(|| map.values().find_map(first_message)),
        other => first_message(&other),
    }
}

fn first_message(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Array(items) => items.iter().find_map(first_message),
        Value::Object(map) => map.values().find_map(first_message),
        _ => None,
    }
}

/// Errors that can be shown in a projection's `error` slot.
pub trait ErrorMessage {
    /// Message to display.
    fn error_message(&self) -> String;
}

impl ErrorMessage for SessionError {
    fn error_message(&self) -> String {
        self.message()
    }
}

impl ErrorMessage for StorageError {
    fn error_message(&self) -> String {
        self.to_string()
    }
}

impl ErrorMessage for String {
    fn error_message(&self) -> String {
        self.clone()
    }
}

impl ErrorMessage for &str {
    fn error_message(&self) -> String {
        (*self).to_string()
    }
}
