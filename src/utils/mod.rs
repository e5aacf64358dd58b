//! Utility functions and helpers.

pub mod http;

use std::time::Duration;

/// Sleep for a fixed pacing delay; zero delays return immediately.
pub async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Shorten upstream text for log and error messages.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
