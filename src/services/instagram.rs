// src/services/instagram.rs

//! Instagram follower source.
//!
//! Uses the private mobile API with an existing `sessionid` cookie. Follower
//! pages only carry profile basics, so every flushed follower gets a
//! `users/{pk}/info/` lookup for its counters.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{CheckpointState, Cursor, FollowerRecord, InstagramConfig, Page, Platform};
use crate::services::PageSource;
use crate::utils::{http::send_json, pause};

/// Detail fields copied from the user info lookup.
const DETAIL_FIELDS: [&str; 4] = [
    "follower_count",
    "following_count",
    "mutual_followers_count",
    "is_new_to_instagram",
];

const SESSION_KEY: &str = "sessionid";
const DEVICE_KEY: &str = "device_id";
const UUID_KEY: &str = "uuid";

/// Credentials of an established Instagram session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstagramSession {
    pub session_id: String,
    pub device_id: String,
}

impl InstagramSession {
    /// Resolve the session from a freshly supplied id or the saved blob.
    ///
    /// A supplied id is written into `state.insta_api`; the returned flag
    /// tells the caller the state changed and should be saved.
    pub fn establish(
        state: &mut CheckpointState,
        supplied: Option<String>,
    ) -> Result<(Self, bool)> {
        let settings = &mut state.insta_api;

        if let Some(session_id) = supplied.filter(|s| !s.trim().is_empty()) {
            log::info!("Using Instagram session from environment, updating save data");
            let device_id = settings
                .string(DEVICE_KEY)
                .map(str::to_string)
                .unwrap_or_else(new_device_id);
            settings.set_bytes(SESSION_KEY, session_id.trim().as_bytes().to_vec());
            settings.set_string(DEVICE_KEY, device_id.clone());
            if settings.string(UUID_KEY).is_none() {
                settings.set_string(UUID_KEY, Uuid::new_v4().to_string());
            }
            return Ok((
                Self {
                    session_id: session_id.trim().to_string(),
                    device_id,
                },
                true,
            ));
        }

        let session_id = settings
            .bytes(SESSION_KEY)
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                AppError::auth(
                    "no Instagram session: set INSTAGRAM_SESSIONID or provide save data with a session",
                )
            })?;
        let device_id = settings
            .string(DEVICE_KEY)
            .map(str::to_string)
            .unwrap_or_else(new_device_id);
        log::info!("Reusing saved Instagram session (device {})", device_id);
        Ok((
            Self {
                session_id,
                device_id,
            },
            false,
        ))
    }
}

fn new_device_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("android-{}", &hex[..16])
}

#[derive(Debug, Deserialize)]
struct FollowersResponse {
    #[serde(default)]
    users: Vec<FollowerRecord>,
    #[serde(default)]
    next_max_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    user: Map<String, Value>,
}

/// Instagram follower pages for one user.
pub struct InstagramSource {
    client: Client,
    base: Url,
    app_id: String,
    user_agent: String,
    detail_delay: Duration,
    session: InstagramSession,
    user_id: String,
    rank_token: String,
}

impl InstagramSource {
    pub fn new(
        client: Client,
        config: &InstagramConfig,
        session: InstagramSession,
        user_id: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            client,
            base: config.base_url()?,
            app_id: config.app_id.clone(),
            user_agent: config.user_agent.clone(),
            detail_delay: Duration::from_millis(config.detail_delay_ms),
            session,
            user_id: user_id.into(),
            rank_token: Uuid::new_v4().to_string(),
        })
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .header(
                reqwest::header::COOKIE,
                format!("sessionid={}", self.session.session_id),
            )
            .header("X-IG-App-ID", &self.app_id)
            .header("X-IG-Device-ID", &self.session.device_id)
    }

    /// Detail counters for one follower, keeping only truthy values.
    async fn user_details(&self, pk: &str) -> Result<FollowerRecord> {
        let url = self.base.join(&format!("users/{}/info/", pk))?;
        let info: UserInfoResponse = send_json(self.get(url), "instagram user info").await?;

        Ok(DETAIL_FIELDS
            .iter()
            .filter_map(|field| {
                info.user
                    .get(*field)
                    .filter(|v| is_truthy(v))
                    .map(|v| (*field, v.clone()))
            })
            .collect())
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn max_id_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl PageSource for InstagramSource {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    async fn fetch_page(&mut self, cursor: Option<&Cursor>) -> Result<Page> {
        let url = self
            .base
            .join(&format!("friendships/{}/followers/", self.user_id))?;
        let mut request = self
            .get(url)
            .query(&[("rank_token", self.rank_token.as_str())]);
        match cursor {
            Some(Cursor::MaxId(max_id)) => request = request.query(&[("max_id", max_id)]),
            Some(other) => {
                return Err(AppError::validation(format!(
                    "instagram cannot resume from {}",
                    other
                )));
            }
            None => {}
        }

        let response: FollowersResponse = send_json(request, "instagram").await?;
        let next = response.next_max_id.and_then(max_id_text).map(Cursor::MaxId);
        Ok(Page {
            records: response.users,
            has_more: next.is_some(),
            next,
        })
    }

    async fn enrich(&mut self, records: &mut [FollowerRecord]) -> Result<()> {
        log::info!(
            "Grabbing user data for {} followers. This will take a minute...",
            records.len()
        );
        for record in records.iter_mut() {
            let pk = record
                .text("pk")
                .ok_or_else(|| AppError::parse("instagram", "follower without pk"))?;
            let details = self.user_details(&pk).await?;
            record.merge(details);
            pause(self.detail_delay).await;
        }
        Ok(())
    }

    fn detail_fields(&self) -> &'static [&'static str] {
        &DETAIL_FIELDS
    }

    fn restart(&mut self) {
        self.rank_token = Uuid::new_v4().to_string();
    }
}
