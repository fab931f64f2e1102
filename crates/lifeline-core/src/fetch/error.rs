use std::time::Duration;

use thiserror::Error;

/// Maximum length for response-derived text in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),

    #[error("{0}")]
    Other(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
}

impl FetchError {
    /// Truncate response-derived text to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    pub fn http(status: u16, message: &str) -> Self {
        FetchError::Http {
            status,
            message: Self::truncate_body(message),
        }
    }

    /// HTTP status, or 0 when no response was received.
    pub fn status(&self) -> u16 {
        match self {
            FetchError::Http { status, .. } => *status,
            _ => 0,
        }
    }

    /// Failures where no HTTP exchange completed; only these are retried.
    pub fn is_transport(&self) -> bool {
        !matches!(self, FetchError::Http { .. })
    }

    /// Text shown to end users once retries are exhausted.
    pub fn user_message(&self) -> String {
        match self {
            FetchError::Timeout(_) => "Request timeout. Server may be overloaded or offline.".to_string(),
            FetchError::Network(_) => {
                "Unable to connect to server. Please check if the API is running.".to_string()
            }
            FetchError::Other(message) | FetchError::Http { message, .. } => message.clone(),
        }
    }
}
