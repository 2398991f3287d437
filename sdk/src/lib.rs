//! Barista SDK
//!
//! Shared library providing the error taxonomy and tool vocabulary used by
//! the Barista engine and by anything that implements tools against it.

/// Error types and handling
pub mod errors;

/// Tool input and failure types
pub mod types;

// Re-export commonly used types
pub use errors::{BaristaErrorExt, EngineError};
pub use types::{Params, ToolError, ToolFailure, ToolInput};
