//! HTTP client utilities.

use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::{AppError, Result};
use crate::models::HttpConfig;
use crate::utils::truncate;

/// Create a configured asynchronous HTTP client.
pub fn create_client(config: &HttpConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Send a request and decode a JSON body.
///
/// Status codes are classified before decoding: 429 is a rate limit,
/// 401/403 an authentication failure, anything else non-2xx an upstream
/// error. `context` names the upstream in errors.
pub async fn send_json<T: DeserializeOwned>(request: RequestBuilder, context: &str) -> Result<T> {
    let response = request.send().await?;
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(AppError::RateLimited {
            platform: context.to_string(),
        });
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = truncate(body.trim(), 200);
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AppError::auth(format!(
                "{} rejected credentials (HTTP {}): {}",
                context,
                status.as_u16(),
                message
            )));
        }
        return Err(AppError::Upstream {
            platform: context.to_string(),
            status: status.as_u16(),
            message,
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| AppError::parse(context, e))
}
