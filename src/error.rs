//! Crate-level error types.
//!
//! [`BankviewError`] unifies every error source (configuration, HTTP,
//! WebSocket, payload decoding, local input validation) behind a single
//! enum so callers can match on the variant they care about while still
//! using the `?` operator for easy propagation.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BankviewError>;

/// Maximum number of response body bytes kept in a [`BankviewError::Status`].
const MAX_ERROR_BODY: usize = 200;

/// Top-level error type returned by all public APIs.
#[derive(Debug, thiserror::Error)]
pub enum BankviewError {
    /// Configuration could not be read or was inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// The request never produced a response (connect failure, timeout, reset).
    #[error("network failure: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status.
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// A response or push payload did not have the expected shape.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// User input was rejected locally; no request was issued.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A WebSocket operation (connect, send, receive) failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// Terminal or log file I/O failed.
    #[error("I/O error: {0}")]
    Io(String),
}

impl BankviewError {
    /// Builds a [`BankviewError::Status`], truncating long bodies.
    pub fn status(status: u16, body: &str) -> Self {
        let body = body.trim();
        let body = match body.char_indices().nth(MAX_ERROR_BODY) {
            Some((cut, _)) => format!("{}...", &body[..cut]),
            None => body.to_string(),
        };
        Self::Status { status, body }
    }

    /// Short category name used when surfacing the error in the UI.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Network(_) => "network",
            Self::Status { .. } => "server",
            Self::MalformedPayload(_) => "payload",
            Self::InvalidInput(_) => "input",
            Self::WebSocket(_) => "websocket",
            Self::Io(_) => "io",
        }
    }
}
