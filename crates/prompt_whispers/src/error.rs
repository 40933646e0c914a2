//! Error types for the REST client, configuration and prompt input.

use derive_more::{Display, Error};
use tracing::instrument;

/// Category of a failed backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ApiErrorKind {
    /// The request never produced a response (connect, timeout, TLS).
    #[display("transport")]
    Transport,
    /// The backend answered with a non-success status code.
    #[display("status {_0}")]
    Status(u16),
    /// The response body could not be decoded.
    #[display("decode")]
    Decode,
}

/// Backend error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("API error ({}): {} at {}:{}", kind, message, file, line)]
pub struct ApiError {
    /// What went wrong.
    pub kind: ApiErrorKind,
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ApiError {
    /// Creates a new API error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Creates an error for a non-success HTTP status.
    #[track_caller]
    pub fn status(code: u16, body: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Status(code), body)
    }

    /// Returns true if the backend reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        self.kind == ApiErrorKind::Status(404)
    }
}

impl From<reqwest::Error> for ApiError {
    #[track_caller]
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_decode() {
            ApiErrorKind::Decode
        } else if let Some(status) = err.status() {
            ApiErrorKind::Status(status.as_u16())
        } else {
            ApiErrorKind::Transport
        };
        Self::new(kind, err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        Self::new(ApiErrorKind::Decode, err.to_string())
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

/// A prompt that cannot be submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum PromptError {
    /// No prompt is being asked for right now.
    #[display("no prompt requested")]
    NotRequested,
    /// Nothing but whitespace was entered.
    #[display("prompt is empty")]
    Empty,
    /// The prompt exceeds the character limit.
    #[display("prompt has {len} characters, limit is {max}")]
    TooLong {
        /// Characters entered.
        len: usize,
        /// Characters allowed.
        max: usize,
    },
}
