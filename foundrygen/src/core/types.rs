//! Foundrygen Core Type Definitions
//!
//! Identifier aliases shared across the client modules.

/// Service-assigned video generation job identifier
pub type JobId = String;

/// Service-assigned identifier of one produced video
pub type GenerationId = String;

/// Client-side poll session identifier (ULID)
pub type SessionId = String;

/// Returns at most `max_chars` characters of `text`, for log lines.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
