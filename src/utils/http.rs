// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::WatcherConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &WatcherConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Fetch a page body as text.
///
/// Transport failures, timeouts and non-2xx statuses are `Fetch` errors;
/// an empty body is an `Extraction` error.
pub async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String> {
    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            AppError::fetch(url, "request timed out")
        } else {
            AppError::fetch(url, e.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::fetch(url, format!("HTTP {status}")));
    }

    let body = response
        .text()
        .await
        .map_err(|e| AppError::fetch(url, format!("reading body: {e}")))?;
    if body.trim().is_empty() {
        return Err(AppError::extraction(url, "empty response body"));
    }
    Ok(body)
}
