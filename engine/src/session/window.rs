//! History window sent to the model
//!
//! The stored log is never trimmed. Each turn sends a suffix of it that fits a
//! token budget, estimated at roughly four characters per token.

use crate::llm::Message;

/// Average characters per token (rough estimate)
const CHARS_PER_TOKEN: usize = 4;

/// Per-message overhead for role and framing
const MESSAGE_OVERHEAD: usize = 10;

/// Messages always kept regardless of budget (the latest exchange)
const MIN_KEPT: usize = 2;

/// Estimate the number of tokens in a message
pub fn estimate_tokens(message: &Message) -> usize {
    message.content.len().div_ceil(CHARS_PER_TOKEN) + MESSAGE_OVERHEAD
}

/// Return the most recent messages whose estimated size fits `max_tokens`.
///
/// Oldest messages are dropped first. The most recent exchange is always kept,
/// even if it alone exceeds the budget.
pub fn history_window(messages: &[Message], max_tokens: usize) -> &[Message] {
    let mut total = 0usize;
    let mut start = messages.len();

    for (idx, message) in messages.iter().enumerate().rev() {
        let kept = messages.len() - idx;
        total += estimate_tokens(message);
        if total > max_tokens && kept > MIN_KEPT {
            break;
        }
        start = idx;
    }

    &messages[start..]
}
