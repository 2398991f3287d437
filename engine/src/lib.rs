//! Barista Engine Library
//!
//! Conversational decision engine for a coffee chain's customer assistant.
//! Used by the `barista` binary and by integration tests.

/// Configuration management module
pub mod config;

/// Safety guard: SQL boundary, injection screen and reply sanitizer
pub mod guard;

/// LLM provider abstraction layer
pub mod llm;

/// Location classification and distance ranking
pub mod location;

/// Local outlet catalogue behind the text-to-SQL boundary
pub mod outlets;

/// Per-session conversation memory
pub mod session;

/// Tool adapters and registry
pub mod tools;

/// Planner, decision parser, dispatcher and synthesizer
pub mod agent;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
