// src/services/tiktok.rs

//! TikTok follower source via the ScrapTik API on RapidAPI.
//!
//! Pages walk backwards in time: each response carries `min_time`, which is
//! sent as `max_time` for the next request. `max_time=0` starts from the
//! newest follower.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Cursor, FollowerRecord, Page, Platform, TiktokConfig};
use crate::services::PageSource;
use crate::utils::http::send_json;

#[derive(Debug, Deserialize)]
struct FollowersResponse {
    followers: Vec<FollowerRecord>,
    #[serde(default, deserialize_with = "flag")]
    has_more: bool,
    min_time: Option<i64>,
}

/// `has_more` arrives as a boolean or as 0/1.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    })
}

/// TikTok follower pages for one user.
pub struct TiktokSource {
    client: Client,
    url: Url,
    api_key: String,
    api_host: String,
    user_id: String,
    count: u32,
}

impl TiktokSource {
    pub fn new(
        client: Client,
        config: &TiktokConfig,
        api_key: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            client,
            url: Url::parse(&config.api_url)?,
            api_key: api_key.into(),
            api_host: config.api_host.clone(),
            user_id: user_id.into(),
            count: config.count,
        })
    }
}

#[async_trait]
impl PageSource for TiktokSource {
    fn platform(&self) -> Platform {
        Platform::Tiktok
    }

    async fn fetch_page(&mut self, cursor: Option<&Cursor>) -> Result<Page> {
        let max_time = match cursor {
            Some(Cursor::Timestamp(ts)) => *ts,
            None => 0,
            Some(other) => {
                return Err(AppError::validation(format!(
                    "tiktok cannot resume from {}",
                    other
                )));
            }
        };

        let request = self
            .client
            .get(self.url.clone())
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", &self.api_host)
            .query(&[
                ("user_id", self.user_id.clone()),
                ("count", self.count.to_string()),
                ("max_time", max_time.to_string()),
            ]);

        let response: FollowersResponse = send_json(request, "tiktok").await?;
        log::debug!(
            "Scraped from max_time {} down to min_time {:?}",
            max_time,
            response.min_time
        );

        Ok(Page {
            records: response.followers,
            next: response.min_time.map(Cursor::Timestamp),
            has_more: response.has_more,
        })
    }
}
