// src/services/twitter.rs

//! Twitter follower source (API v2, bearer token).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Cursor, FollowerRecord, Page, Platform, TwitterConfig};
use crate::services::PageSource;
use crate::utils::http::send_json;

const USER_FIELDS: &str = "verified,public_metrics";

#[derive(Debug, Deserialize)]
struct FollowersResponse {
    #[serde(default)]
    data: Vec<TwitterUser>,
    #[serde(default)]
    meta: Meta,
}

#[derive(Debug, Default, Deserialize)]
struct Meta {
    next_token: Option<String>,
    previous_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TwitterUser {
    id: String,
    username: String,
    #[serde(default)]
    verified: bool,
    #[serde(default)]
    public_metrics: PublicMetrics,
}

#[derive(Debug, Default, Deserialize)]
struct PublicMetrics {
    #[serde(default)]
    followers_count: u64,
    #[serde(default)]
    following_count: u64,
    #[serde(default)]
    tweet_count: u64,
    #[serde(default)]
    listed_count: u64,
}

impl From<TwitterUser> for FollowerRecord {
    fn from(user: TwitterUser) -> Self {
        let metrics = user.public_metrics;
        [
            ("id", json!(user.id)),
            ("username", json!(user.username)),
            ("followers_count", json!(metrics.followers_count)),
            ("following_count", json!(metrics.following_count)),
            ("tweet_count", json!(metrics.tweet_count)),
            ("listed_count", json!(metrics.listed_count)),
            ("verified", json!(user.verified)),
        ]
        .into_iter()
        .collect()
    }
}

/// Twitter follower pages for one user.
pub struct TwitterSource {
    client: Client,
    base: Url,
    bearer: String,
    user_id: String,
    max_results: u32,
    page_limit: usize,
    pages_fetched: usize,
}

impl TwitterSource {
    pub fn new(
        client: Client,
        config: &TwitterConfig,
        bearer: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            client,
            base: config.base_url()?,
            bearer: bearer.into(),
            user_id: user_id.into(),
            max_results: config.max_results,
            page_limit: config.page_limit,
            pages_fetched: 0,
        })
    }
}

#[async_trait]
impl PageSource for TwitterSource {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    async fn fetch_page(&mut self, cursor: Option<&Cursor>) -> Result<Page> {
        let url = self
            .base
            .join(&format!("users/{}/followers", self.user_id))?;
        let max_results = self.max_results.to_string();
        let mut request = self
            .client
            .get(url)
            .bearer_auth(&self.bearer)
            .query(&[
                ("max_results", max_results.as_str()),
                ("user.fields", USER_FIELDS),
            ]);
        match cursor {
            Some(Cursor::Token { next, .. }) => {
                request = request.query(&[("pagination_token", next)]);
            }
            Some(other) => {
                return Err(AppError::validation(format!(
                    "twitter cannot resume from {}",
                    other
                )));
            }
            None => {}
        }

        let response: FollowersResponse = send_json(request, "twitter").await?;
        self.pages_fetched += 1;

        let Meta {
            next_token,
            previous_token,
        } = response.meta;
        let next = next_token.map(|next| Cursor::Token {
            next,
            previous: previous_token,
        });
        let within_limit = self.page_limit == 0 || self.pages_fetched < self.page_limit;
        if next.is_some() && !within_limit {
            log::info!("Reached page limit of {} pages", self.page_limit);
        }

        Ok(Page {
            records: response.data.into_iter().map(FollowerRecord::from).collect(),
            has_more: next.is_some() && within_limit,
            next,
        })
    }

    fn restart(&mut self) {
        self.pages_fetched = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::aggregate_field_names;
    use crate::models::HttpConfig;
    use crate::utils::http::create_client;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(server: &MockServer, page_limit: usize) -> TwitterSource {
        let config = TwitterConfig {
            api_base: format!("{}/2/", server.uri()),
            page_limit,
            ..TwitterConfig::default()
        };
        let client = create_client(&HttpConfig::default()).unwrap();
        TwitterSource::new(client, &config, "token", "783214").unwrap()
    }

    fn body(next: Option<&str>) -> serde_json::Value {
        let mut meta = json!({"result_count": 1, "previous_token": "prev0"});
        if let Some(next) = next {
            meta["next_token"] = json!(next);
        }
        json!({
            "data": [{
                "id": "2244994945",
                "username": "TwitterDev",
                "verified": true,
                "public_metrics": {
                    "followers_count": 513958,
                    "following_count": 2039,
                    "tweet_count": 3635,
                    "listed_count": 1672
                }
            }],
            "meta": meta
        })
    }

    #[tokio::test]
    async fn test_flattens_users_in_fixed_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2/users/783214/followers"))
            .and(header("authorization", "Bearer token"))
            .and(query_param("user.fields", USER_FIELDS))
            .and(query_param("pagination_token", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body(Some("def"))))
            .mount(&server)
            .await;

        let mut source = source(&server, 100);
        let cursor = Cursor::Token {
            next: "abc".into(),
            previous: None,
        };
        let page = source.fetch_page(Some(&cursor)).await.unwrap();

        assert_eq!(
            aggregate_field_names(&page.records),
            [
                "id",
                "username",
                "followers_count",
                "following_count",
                "tweet_count",
                "listed_count",
                "verified"
            ]
        );
        assert_eq!(page.records[0].text("followers_count").as_deref(), Some("513958"));
        assert_eq!(
            page.next,
            Some(Cursor::Token {
                next: "def".into(),
                previous: Some("prev0".into())
            })
        );
        assert!(page.has_more);
    }

    #[tokio::test]
    async fn test_page_limit_ends_stream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2/users/783214/followers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body(Some("more"))))
            .mount(&server)
            .await;

        let mut source = source(&server, 2);
        assert!(!source.fetch_page(None).await.unwrap().is_last());
        assert!(source.fetch_page(None).await.unwrap().is_last());

        source.restart();
        assert!(!source.fetch_page(None).await.unwrap().is_last());
    }

    #[tokio::test]
    async fn test_rejects_foreign_cursor() {
        let server = MockServer::start().await;
        let mut source = source(&server, 100);
        let err = source
            .fetch_page(Some(&Cursor::Timestamp(5)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
