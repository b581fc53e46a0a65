// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::Result;
use crate::models::FeedConfig;

/// Create a configured asynchronous HTTP client for the feed endpoint.
pub fn create_async_client(config: &FeedConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs));

    if config.insecure_skip_verify {
        log::warn!(
            "TLS certificate validation is DISABLED for {} (feed.insecure_skip_verify)",
            config.url
        );
        builder = builder.danger_accept_invalid_certs(true);
    }

    Ok(builder.build()?)
}
