//! Errors surfaced by the client. Every variant renders to a message that can
//! be shown inline to an operator as-is.

use serde_json::Value;
use thiserror::Error;

pub const GENERIC_MESSAGE: &str = "An unknown error occurred.";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Caught before any network call.
    #[error("{0}")]
    Validation(String),
    /// The backend answered with a non-success status.
    #[error("{message}")]
    Request { status: u16, message: String },
    /// The request never got a usable answer.
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("Unexpected response from server: {0}")]
    Decode(String),
    #[error("Not logged in. Run `stagehand auth login` first.")]
    NotAuthenticated,
    #[error("Token storage failed: {0}")]
    Storage(String),
}

impl ApiError {
    /// Build a request error from a response status and its raw body.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = describe_body(body)
            .unwrap_or_else(|| format!("Request failed with status code {status}"));
        ApiError::Request { status, message }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Request { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403)) || *self == ApiError::NotAuthenticated
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}

/// Flatten an error body into something readable: a plain string body wins,
/// then a `detail` field, then `field: a, b` pairs joined with `; `.
pub fn describe_body(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(body) {
        Ok(value) => describe_value(&value),
        Err(_) => Some(body.to_string()),
    }
}

fn describe_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => {
            if let Some(detail) = map.get("detail") {
                if let Some(detail) = flatten(detail) {
                    return Some(detail);
                }
            }
            let fields = map
                .iter()
                .filter_map(|(key, val)| flatten(val).map(|val| format!("{key}: {val}")))
                .collect::<Vec<_>>()
                .join("; ");
            if fields.is_empty() {
                Some(GENERIC_MESSAGE.to_string())
            } else {
                Some(fields)
            }
        }
        Value::Array(_) => flatten(value),
        _ => None,
    }
}

fn flatten(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let joined = items
                .iter()
                .filter_map(flatten)
                .collect::<Vec<_>>()
                .join(", ");
            if joined.is_empty() {
                None
            } else {
                Some(joined)
            }
        }
        Value::Object(_) => describe_value(value),
        other => Some(other.to_string()),
    }
}
