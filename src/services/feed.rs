// src/services/feed.rs

//! Feed client.
//!
//! Issues one GET per call against the configured endpoint. There is no
//! retry here: a failed fetch aborts the run and the caller keeps the last
//! good snapshot.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{FetchError, Result};
use crate::models::FeedConfig;
use crate::utils::http;

/// Source of raw feed text.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Retrieve the raw feed body.
    async fn fetch(&self) -> Result<String>;
}

/// Feed source backed by an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpFeedClient {
    client: Client,
    url: String,
    timeout_secs: u64,
}

impl HttpFeedClient {
    /// Build a client from feed settings.
    pub fn new(config: &FeedConfig) -> Result<Self> {
        Ok(Self {
            client: http::create_async_client(config)?,
            url: config.url.clone(),
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl FeedSource for HttpFeedClient {
    async fn fetch(&self) -> Result<String> {
        log::info!("Fetching feed from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()).into());
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(e, self.timeout_secs))?;

        log::info!("Fetched feed ({} bytes)", body.len());
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer, timeout_secs: u64) -> FeedConfig {
        FeedConfig {
            url: format!("{}/top1000.php", server.uri()),
            timeout_secs,
            ..FeedConfig::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/top1000.php"))
            .respond_with(ResponseTemplate::new(200).set_body_string("create time x by y\n"))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpFeedClient::new(&config_for(&server, 5)).unwrap();
        let body = client.fetch().await.unwrap();
        assert_eq!(body, "create time x by y\n");
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = HttpFeedClient::new(&config_for(&server, 5)).unwrap();
        let err = client.fetch().await.unwrap_err();
        assert!(matches!(err, AppError::Fetch(FetchError::Status(503))));
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let client = HttpFeedClient::new(&config_for(&server, 1)).unwrap();
        let err = client.fetch().await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Fetch(FetchError::Timeout { secs: 1 })
        ));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let config = FeedConfig {
            url: "http://127.0.0.1:9/top1000.php".to_string(),
            timeout_secs: 2,
            ..FeedConfig::default()
        };
        let client = HttpFeedClient::new(&config).unwrap();
        let err = client.fetch().await.unwrap_err();
        assert!(matches!(err, AppError::Fetch(_)));
    }
}
