//! Error types for cron8n.
//!
//! Every user-facing failure falls into one of four categories (auth,
//! remote API, validation, file). Each carries a human message and an
//! optional remediation hint that the CLI prints under the message.

use serde_json::json;
use thiserror::Error;

/// Result type alias for cron8n operations.
pub type Result<T> = std::result::Result<T, Error>;

/// cron8n error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Not logged in, or the server rejected the stored credentials.
    #[error("Authentication error: {message}")]
    Auth {
        message: String,
        hint: Option<String>,
    },

    /// The remote API answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Bad user input (cron expression, URL, slug, missing field).
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        hint: Option<String>,
    },

    /// Missing, unreadable or malformed local file.
    #[error("File error: {message}")]
    File {
        message: String,
        hint: Option<String>,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn auth(message: impl Into<String>) -> Self {
        Error::Auth {
            message: message.into(),
            hint: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
            hint: None,
        }
    }

    pub fn file(message: impl Into<String>) -> Self {
        Error::File {
            message: message.into(),
            hint: None,
        }
    }

    /// Build an API error from a status code and an optional server message.
    pub fn api(status: u16, message: Option<String>) -> Self {
        Error::Api {
            status,
            message: message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| format!("Request failed with status code {}", status)),
        }
    }

    /// Attach a remediation hint. Variants without a hint slot are returned unchanged.
    pub fn with_hint(mut self, text: impl Into<String>) -> Self {
        match &mut self {
            Error::Auth { hint, .. } | Error::Validation { hint, .. } | Error::File { hint, .. } => {
                *hint = Some(text.into());
            }
            _ => {}
        }
        self
    }

    /// Get the remediation hint, if any.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Error::Auth { hint, .. } | Error::Validation { hint, .. } | Error::File { hint, .. } => {
                hint.as_deref()
            }
            Error::Api { status: 401, .. } | Error::Api { status: 403, .. } => {
                Some("Check your credentials with 'cron8n auth status'")
            }
            Error::Http(e) if e.is_connect() => Some("Is the n8n server reachable?"),
            _ => None,
        }
    }

    /// Get the error code for machine parsing.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Auth { .. } => "AUTH_ERROR",
            Error::Api { .. } => "API_ERROR",
            Error::Validation { .. } => "VALIDATION_ERROR",
            Error::File { .. } => "FILE_ERROR",
            Error::Http(_) => "HTTP_ERROR",
            Error::Json(_) => "JSON_ERROR",
            Error::Io(_) => "IO_ERROR",
        }
    }

    /// Status code of a remote API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Convert to a JSON response body for the web UI.
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": self.to_string(),
                "hint": self.hint(),
            }
        })
    }
}
