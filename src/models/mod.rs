// src/models/mod.rs

//! Domain models for the follower harvester.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod checkpoint;
mod config;
mod cursor;
mod platform;
mod record;

// Re-export all public types
pub use checkpoint::{
    CheckpointState, InstagramCursors, SessionSettings, SettingValue, TaggedBytes, TiktokCursors,
    TwitterCursors,
};
pub use config::{
    BackoffConfig, Config, HttpConfig, InstagramConfig, Pacing, SessionConfig, TiktokConfig,
    TwitterConfig,
};
pub use cursor::Cursor;
pub use platform::Platform;
pub use record::FollowerRecord;

/// One page of followers returned by a page source.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<FollowerRecord>,
    /// Cursor to request the following page with
    pub next: Option<Cursor>,
    /// Whether the upstream reports more pages
    pub has_more: bool,
}

impl Page {
    /// True when no further page can be requested.
    pub fn is_last(&self) -> bool {
        !self.has_more || self.next.is_none()
    }
}
