//! Dead-session recognition.
//!
//! Transports report failures as free text, so recognition is substring
//! matching on the lower-cased message. The fragment list is a compatibility
//! contract with the transport's error wording: changing it changes which
//! failures trigger a disconnect.

use std::fmt::Display;

/// Lower-case fragments that mean the session's transport is gone.
pub const DEAD_SESSION_FRAGMENTS: &[&str] = &[
    "session is not running",
    "session not found",
    "failed to write lsp header",
    "failed to write lsp payload",
    "failed to flush lsp payload",
    "broken pipe",
    "pipe is being closed",
    "pipe has been ended",
];

/// Whether `error` indicates a terminated or broken session.
#[must_use]
pub fn is_dead_session(error: &(impl Display + ?Sized)) -> bool {
    let text = error.to_string().to_lowercase();
    DEAD_SESSION_FRAGMENTS
        .iter()
        .any(|fragment| text.contains(fragment))
}
