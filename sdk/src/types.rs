//! Tool input and failure types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Keyword parameters handed to a tool, as decoded from the decision's PARAMS line
pub type Params = serde_json::Map<String, serde_json::Value>;

/// Input to a tool invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolInput {
    pub tool: String,
    pub params: Params,
}

impl ToolInput {
    /// Create a new ToolInput with no parameters
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            params: Params::new(),
        }
    }

    /// Create a ToolInput from an already decoded parameter map
    pub fn with_params(tool: impl Into<String>, params: Params) -> Self {
        Self {
            tool: tool.into(),
            params,
        }
    }

    /// Add a parameter
    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Get a required string parameter
    pub fn param_str(&self, key: &str) -> Result<String, ToolError> {
        self.param_str_opt(key)
            .ok_or_else(|| ToolError::MissingParameter(key.to_string()))
    }

    /// Get an optional, non-blank string parameter.
    ///
    /// Numbers are accepted and rendered as text, since models often emit
    /// `{"expression": 42}` where a string was asked for.
    pub fn param_str_opt(&self, key: &str) -> Option<String> {
        match self.params.get(key)? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Get an optional floating point parameter (number or numeric string)
    pub fn param_f64_opt(&self, key: &str) -> Option<f64> {
        match self.params.get(key)? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Get an optional unsigned integer parameter (number or numeric string)
    pub fn param_u64_opt(&self, key: &str) -> Option<u64> {
        match self.params.get(key)? {
            serde_json::Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Why a tool invocation did not produce a usable result.
///
/// Adapters map every transport or backend problem into exactly one of
/// these categories so callers can match exhaustively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolFailure {
    /// The collaborator did not answer within the adapter's timeout
    Timeout,

    /// The collaborator could not be reached
    Connection,

    /// The collaborator answered with a non-success HTTP status
    Http { status: u16 },

    /// The collaborator answered but reported `success: false`
    Backend,

    /// The decision's parameters could not be used for this tool
    InvalidParams { reason: String },

    /// Anything else (malformed body, client construction, ...)
    Unexpected { reason: String },
}

impl ToolFailure {
    /// Short machine-friendly label, used for logs and diagnostics
    pub fn label(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connection => "connection",
            Self::Http { .. } => "http",
            Self::Backend => "backend",
            Self::InvalidParams { .. } => "invalid_params",
            Self::Unexpected { .. } => "unexpected",
        }
    }
}

impl fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timed out"),
            Self::Connection => write!(f, "connection failed"),
            Self::Http { status } => write!(f, "HTTP status {}", status),
            Self::Backend => write!(f, "backend reported failure"),
            Self::InvalidParams { reason } => write!(f, "invalid parameters: {}", reason),
            Self::Unexpected { reason } => write!(f, "unexpected failure: {}", reason),
        }
    }
}

/// Tool-specific errors
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Missing parameter: {0}")]
    MissingParameter(String),
}

impl From<ToolError> for ToolFailure {
    fn from(err: ToolError) -> Self {
        ToolFailure::InvalidParams {
            reason: err.to_string(),
        }
    }
}
