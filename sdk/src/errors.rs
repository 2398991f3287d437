//! Error types and handling
//!
//! This module provides the error types used throughout the Barista engine.
//! All errors implement the `BaristaErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! # Security
//!
//! Hints are static strings. They never carry:
//! - Secrets (API keys, tokens)
//! - Generated SQL or raw collaborator payloads
//! - Internal paths or identifiers

use thiserror::Error;

/// Trait for Barista error extensions
pub trait BaristaErrorExt {
    /// Returns a user-friendly hint for the error, safe to show to end users
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried by the caller. Non-recoverable
    /// errors need configuration changes or manual intervention.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: Invalid or missing configuration
/// - **Database**: Outlet catalogue failures
/// - **LLM Provider**: Model call failures
/// - **Tools**: Unknown tools and collaborator failures
/// - **Safety**: Requests or statements refused by the SQL guard
///
/// # Examples
///
/// ```
/// use sdk::errors::{BaristaErrorExt, EngineError};
///
/// let error = EngineError::WriteQueryNotAllowed;
/// println!("Hint: {}", error.user_hint());
/// assert!(error.is_recoverable());
///
/// let fatal = EngineError::Config("bad log level".into());
/// assert!(!fatal.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(String),

    // LLM provider errors
    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    #[error("LLM call timed out")]
    LLMTimeout,

    #[error("LLM rate limit exceeded")]
    RateLimited,

    // Tool errors
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool error: {0}")]
    ToolError(String),

    // Safety errors
    #[error("Request refused by SQL guard: {0}")]
    RequestRefused(String),

    #[error("Write query not allowed")]
    WriteQueryNotAllowed,

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BaristaErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",
            Self::Database(_) => "The outlet catalogue is unavailable right now",
            Self::LLMProvider(_) => "The assistant is unavailable. Check your API key and network",
            Self::LLMTimeout => "The assistant took too long to respond. Try again",
            Self::RateLimited => "Too many requests right now. Please try again in a moment",
            Self::ToolNotFound(_) => "The requested tool is not available",
            Self::ToolError(_) => "A backend service could not complete the request",
            Self::RequestRefused(_) => "That request would modify data and is not permitted",
            Self::WriteQueryNotAllowed => "Write operations not permitted",
            Self::Network(_) => "Network operation failed. Check your connection",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Config(_) | Self::Io(_))
    }
}
