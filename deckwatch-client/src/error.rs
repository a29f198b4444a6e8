//! Error types for the Deckwatch client

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the analysis service
///
/// Cloneable so one failed request can be handed to every caller that was
/// waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The service could not be reached
    #[error("Network error: {0}")]
    Network(String),

    /// The request was rejected as invalid (bad file, HTTP 4xx)
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The service does not know the requested resource
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The service failed while handling the request (HTTP 5xx)
    #[error("Server error (status {status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Error message from the service
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// Map an unsuccessful HTTP status and its message onto the taxonomy
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            404 => Self::NotFound(message),
            400..=499 => Self::Validation(message),
            500..=599 => Self::Server { status, message },
            _ => Self::Internal(format!("unexpected status {}: {}", status, message)),
        }
    }

    /// Check if this error may clear up on retry
    ///
    /// Only a missing resource or a rejected request is final. A garbled body
    /// is usually a proxy or deploy hiccup, so it is retried like a 5xx.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::NotFound(_) | Self::Validation(_))
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this error is a rejected request
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            Self::from_status(status.as_u16(), err.to_string())
        } else if err.is_builder() {
            Self::Internal(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Extracts a human-readable message from an error response body
///
/// Understands `{"error": ...}`, `{"detail": ...}` and field error maps such as
/// `{"errors": {"pitch_deck": ["Only PDF files are allowed"]}}`.
pub(crate) fn extract_error_message(body: &str) -> String {
    let fallback = || {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            "Unknown error".to_string()
        } else {
            trimmed.to_string()
        }
    };

    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return fallback();
    };

    for key in ["error", "detail"] {
        if let Some(message) = value.get(key).and_then(|v| v.as_str()) {
            return message.to_string();
        }
    }

    if let Some(fields) = value.get("errors").and_then(|v| v.as_object()) {
        let parts: Vec<String> = fields
            .iter()
            .map(|(field, messages)| {
                let text = match messages {
                    serde_json::Value::Array(items) => items
                        .iter()
                        .map(|m| m.as_str().map(str::to_string).unwrap_or_else(|| m.to_string()))
                        .collect::<Vec<_>>()
                        .join("; "),
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                format!("{}: {}", field, text)
            })
            .collect();

        if !parts.is_empty() {
            return parts.join(", ");
        }
    }

    fallback()
}
