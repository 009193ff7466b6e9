//! Error handling for the FreightOps client

use std::fmt;
use thiserror::Error;

/// Unified error type for the FreightOps client
#[derive(Error, Debug)]
pub enum Error {
    /// Network or HTTP related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Local session storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Unexpected API responses
    #[error("API error: {0}")]
    Api(String),

    /// Login or registration rejected by the issuer
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The stored refresh token has expired; the session was destroyed
    #[error("Refresh token expired")]
    RefreshTokenExpired,

    /// The refresh endpoint call failed; the session was destroyed
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// A request failed authorization even after one retry-with-refresh
    #[error("Session expired")]
    SessionExpired,
}

impl Error {
    /// Create a new storage error
    pub fn storage<T: fmt::Display>(msg: T) -> Self {
        Error::Storage(msg.to_string())
    }

    /// Create a new API error
    pub fn api<T: fmt::Display>(msg: T) -> Self {
        Error::Api(msg.to_string())
    }
}
