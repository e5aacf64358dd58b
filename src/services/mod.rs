//! Follower page sources.
//!
//! This module contains one client per platform:
//! - Instagram private API (`InstagramSource`), with per-follower detail lookups
//! - Twitter API v2 (`TwitterSource`)
//! - TikTok through the ScrapTik RapidAPI endpoint (`TiktokSource`)

mod instagram;
mod tiktok;
mod twitter;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Cursor, FollowerRecord, Page, Platform};

pub use instagram::{InstagramSession, InstagramSource};
pub use tiktok::TiktokSource;
pub use twitter::TwitterSource;

/// A paginated follower listing for one user on one platform.
#[async_trait]
pub trait PageSource: Send {
    /// Platform the cursors of this source belong to.
    fn platform(&self) -> Platform;

    /// Fetch the page following `cursor`, or the first page when `None`.
    async fn fetch_page(&mut self, cursor: Option<&Cursor>) -> Result<Page>;

    /// Add per-follower detail fields to a batch before it is written.
    async fn enrich(&mut self, _records: &mut [FollowerRecord]) -> Result<()> {
        Ok(())
    }

    /// Detail field names always included in the output header.
    fn detail_fields(&self) -> &'static [&'static str] {
        &[]
    }

    /// Called before pagination starts over after a failure.
    fn restart(&mut self) {}
}
