// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for Scribe
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Main error type for Scribe operations
#[derive(Error, Debug)]
pub enum ScribeError {
    /// Model backend errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Tool execution errors
    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    /// Invalid input (empty request, missing tool fields, malformed frames)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unknown task, message or artifact
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation not allowed in the current state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Task exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Task was cancelled
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Agent loop errors
    #[error("Agent error: {0}")]
    Agent(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure reported by an external collaborator (store, search, importer)
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors coming back from a model or search API
#[derive(Error, Debug)]
pub enum ApiError {
    /// Authentication failed (invalid API key)
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    /// Rate limited by the API
    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u32),

    /// Network connectivity error
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid response from API
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// API returned an error
    #[error("API error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Timeout waiting for response
    #[error("Request timed out")]
    Timeout,

    /// Streaming error
    #[error("Streaming error: {0}")]
    StreamError(String),
}

/// Result type alias for Scribe operations
pub type Result<T> = std::result::Result<T, ScribeError>;

impl ScribeError {
    /// Whether this error ends the owning task because it was stopped from
    /// the outside (cancel or deadline) rather than failing on its own.
    pub fn is_interruption(&self) -> bool {
        matches!(self, ScribeError::Cancelled(_) | ScribeError::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scribe_error_tool_execution() {
        let err = ScribeError::ToolExecution("tool failed".to_string());
        assert!(err.to_string().contains("tool failed"));
    }

    #[test]
    fn test_scribe_error_invalid_input() {
        let err = ScribeError::InvalidInput("message is required".to_string());
        assert!(err.to_string().contains("Invalid input"));
        assert!(err.to_string().contains("message is required"));
    }

    #[test]
    fn test_scribe_error_not_found() {
        let err = ScribeError::NotFound("request abc".to_string());
        assert_eq!(err.to_string(), "Not found: request abc");
    }

    #[test]
    fn test_scribe_error_conflict() {
        let err = ScribeError::Conflict("artifact is accepted".to_string());
        assert!(err.to_string().contains("Conflict"));
    }

    #[test]
    fn test_scribe_error_config() {
        let err = ScribeError::Config("bad config".to_string());
        assert!(err.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_scribe_error_collaborator() {
        let err = ScribeError::Collaborator("store offline".to_string());
        assert!(err.to_string().contains("store offline"));
    }

    #[test]
    fn test_is_interruption() {
        assert!(ScribeError::Cancelled("x".into()).is_interruption());
        assert!(ScribeError::Timeout("x".into()).is_interruption());
        assert!(!ScribeError::Agent("x".into()).is_interruption());
    }

    #[test]
    fn test_api_error_rate_limited() {
        let err = ApiError::RateLimited(30);
        assert!(err.to_string().contains("30 seconds"));
    }

    #[test]
    fn test_api_error_server_error() {
        let err = ApiError::ServerError {
            status: 503,
            message: "overloaded".to_string(),
        };
        assert_eq!(err.to_string(), "API error (503): overloaded");
    }

    #[test]
    fn test_api_error_converts_into_scribe_error() {
        let err: ScribeError = ApiError::Timeout.into();
        assert!(matches!(err, ScribeError::Api(ApiError::Timeout)));
        assert!(err.to_string().contains("Request timed out"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ScribeError = io.into();
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_json_error_converts() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: ScribeError = json_err.into();
        assert!(err.to_string().contains("JSON error"));
    }
}
