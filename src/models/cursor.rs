//! Pagination cursors.

use std::fmt;

/// Continuation marker returned by a paginated follower API.
///
/// A cursor is only meaningful for the platform and user it was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// Instagram `next_max_id`
    MaxId(String),
    /// TikTok `min_time` of the previous page, sent back as `max_time`
    Timestamp(i64),
    /// Twitter `next_token`, with the page's `previous_token` kept for display
    Token {
        next: String,
        previous: Option<String>,
    },
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::MaxId(id) => write!(f, "next_max_id={}", id),
            Cursor::Timestamp(ts) => write!(f, "max_time={}", ts),
            Cursor::Token { next, previous } => write!(
                f,
                "next_cursor={} prev_cursor={}",
                next,
                previous.as_deref().unwrap_or("None")
            ),
        }
    }
}
