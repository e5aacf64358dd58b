// src/error.rs

//! Unified error handling for the follower harvester.

use std::fmt;

use thiserror::Error;

/// Result type alias for harvester operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Exit status for authentication and session setup failures.
pub const EXIT_AUTH: u8 = 9;

/// Exit status for any other unrecoverable failure.
pub const EXIT_UNEXPECTED: u8 = 99;

/// Coarse classification of an [`AppError`].
///
/// The pagination driver currently applies one recovery policy to every
/// kind; the classification exists so callers can tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    RateLimit,
    Parse,
    Auth,
    Storage,
    Config,
}

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// CSV writing failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Credentials missing or rejected
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Upstream asked us to slow down
    #[error("Rate limited by {platform} (HTTP 429)")]
    RateLimited { platform: String },

    /// Upstream answered with a non-success status
    #[error("{platform} returned HTTP {status}: {message}")]
    Upstream {
        platform: String,
        status: u16,
        message: String,
    },

    /// Upstream body did not have the expected shape
    #[error("Malformed response from {context}: {message}")]
    Parse { context: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a parse error with context.
    pub fn parse(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Parse {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Http(_) | Self::Upstream { .. } => ErrorKind::Network,
            Self::RateLimited { .. } => ErrorKind::RateLimit,
            Self::Json(_) | Self::Parse { .. } => ErrorKind::Parse,
            Self::Auth(_) => ErrorKind::Auth,
            Self::Io(_) | Self::Csv(_) => ErrorKind::Storage,
            Self::Toml(_) | Self::Url(_) | Self::Config(_) | Self::Validation(_) => {
                ErrorKind::Config
            }
        }
    }

    /// Process exit status used when this error aborts the program.
    pub fn exit_code(&self) -> u8 {
        match self.kind() {
            ErrorKind::Auth => EXIT_AUTH,
            _ => EXIT_UNEXPECTED,
        }
    }
}
