//! Mechanical safety layer
//!
//! The system prompt asks the model to refuse destructive or off-topic
//! requests, but that is advisory. This module holds the checks that do not
//! depend on the model behaving:
//!
//! - [`SqlGuard`]: refuses destructive natural-language requests before SQL
//!   generation, and refuses any generated statement that is not a single
//!   read-only SELECT before execution. The two checks are independent.
//! - [`InjectionScreen`]: flags user text that tries to override the
//!   assistant's instructions.
//! - [`ReplySanitizer`]: strips markup from every user-facing reply.

mod injection;
mod reply;
mod sql;

pub use injection::{InjectionScreen, InjectionWarning, INJECTION_REMINDER};
pub use reply::ReplySanitizer;
pub use sql::{GuardViolation, SqlGuard, DESTRUCTIVE_REQUEST_WORDS, FORBIDDEN_SQL_KEYWORDS};
