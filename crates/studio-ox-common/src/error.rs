use std::fmt;

use thiserror::Error;

/// Fallback text when an error carries no usable message.
pub const UNKNOWN_ERROR: &str = "unknown error";

/// Errors that can occur while talking to the studio backend
#[derive(Error, Debug)]
pub enum CommonRequestError {
    /// Transport-level failure (connection refused, timeout, broken body)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization failed
    #[error("JSON error: {0}")]
    Json(String),

    /// Backend answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// Backend answered 2xx but reported `success: false`
    #[error("{0}")]
    Rejected(String),

    /// Backend answered 2xx with a body that did not match the expected shape
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Invalid event data in streaming response
    #[error("Invalid event data: {0}")]
    InvalidEventData(String),

    /// A stream event carried an application-level `error` field
    #[error("{0}")]
    StreamEvent(String),

    /// Error originating from the request builder
    #[error("Request builder error: {0}")]
    RequestBuilder(String),
}

impl From<serde_json::Error> for CommonRequestError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Errors that can be shown to a user.
///
/// `server_message` returns the message the backend put in the response body,
/// if there is one. It wins over the `Display` text, which usually carries
/// transport details a user does not care about.
pub trait UserMessage: fmt::Display {
    fn server_message(&self) -> Option<&str> {
        None
    }
}

impl UserMessage for CommonRequestError {
    fn server_message(&self) -> Option<&str> {
        match self {
            Self::Api { message, .. } | Self::Rejected(message) | Self::StreamEvent(message) => {
                Some(message.as_str())
            }
            _ => None,
        }
    }
}

/// Most specific human-readable message for `err`.
pub fn user_message<E: UserMessage + ?Sized>(err: &E) -> String {
    if let Some(message) = err.server_message().map(str::trim).filter(|m| !m.is_empty()) {
        return message.to_string();
    }

    let text = err.to_string();
    if text.trim().is_empty() {
        UNKNOWN_ERROR.to_string()
    } else {
        text
    }
}

/// Failure of a handler-driven stream read.
#[derive(Error, Debug)]
pub enum DispatchError<E> {
    /// The stream itself failed: transport, HTTP status or a fatal error event
    #[error(transparent)]
    Stream(#[from] CommonRequestError),

    /// The caller's per-event handler failed
    #[error("{0}")]
    Handler(E),
}

impl<E: fmt::Display> UserMessage for DispatchError<E> {
    fn server_message(&self) -> Option<&str> {
        match self {
            Self::Stream(err) => err.server_message(),
            Self::Handler(_) => None,
        }
    }
}

/// Parse error response from HTTP status and body
pub fn parse_error_response(status: reqwest::StatusCode, body: &[u8]) -> CommonRequestError {
    let message = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|json| extract_error_message(&json))
        .unwrap_or_else(|| {
            let raw = String::from_utf8_lossy(body).trim().to_string();
            if raw.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or(UNKNOWN_ERROR)
                    .to_string()
            } else {
                raw
            }
        });

    CommonRequestError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Extract the error message from the backend's JSON error formats
fn extract_error_message(json: &serde_json::Value) -> Option<String> {
    // FastAPI style: {"detail": "..."} or {"detail": [{"msg": "..."}]}
    if let Some(detail) = json.get("detail") {
        match detail {
            serde_json::Value::String(text) => return Some(text.clone()),
            serde_json::Value::Array(items) => {
                let messages: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(serde_json::Value::as_str))
                    .collect();
                if !messages.is_empty() {
                    return Some(messages.join("; "));
                }
            }
            _ => {}
        }
    }

    if let Some(message) = json.get("message").and_then(serde_json::Value::as_str) {
        return Some(message.to_string());
    }

    // {"error": {"message": "..."}} or {"error": "..."}
    match json.get("error") {
        Some(serde_json::Value::String(text)) => Some(text.clone()),
        Some(error_obj) => error_obj
            .get("message")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string),
        None => None,
    }
}
