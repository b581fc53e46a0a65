// src/services/sites.rs

//! Site URL lookup.
//!
//! Built once at startup from a site-definition table and shared read-only
//! afterwards. The table comes from a local file or from the IYUU sites API.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use url::Url;

use crate::error::{AppError, FetchError, Result};
use crate::models::{Config, FeedConfig, SiteDefinition, SiteLinks, SitesConfig};
use crate::utils::http;

const ID_PLACEHOLDER: &str = "{}";
const DOWNLOAD_MARKER: &str = "download.php";
const DOWNLOAD_STRIP: [&str; 2] = ["&passkey={passkey}", "&downhash={downHash}"];

const SITES_SERVICE: &str = "App.Api.Sites";
const SITES_API_VERSION: &str = "2.0.0";

/// Accepted table layouts: the IYUU API envelope or a bare list.
#[derive(Deserialize)]
#[serde(untagged)]
enum SiteTable {
    Envelope { data: SiteTableData },
    List(Vec<SiteDefinition>),
}

#[derive(Deserialize)]
struct SiteTableData {
    #[serde(default)]
    sites: Vec<SiteDefinition>,
}

/// Immutable map from site name to URL templates.
#[derive(Debug, Clone, Default)]
pub struct SiteDirectory {
    sites: HashMap<String, SiteEntry>,
}

#[derive(Debug, Clone)]
struct SiteEntry {
    origin: String,
    details_page: String,
    download_page: String,
}

impl SiteDirectory {
    /// Build the directory from definitions, applying host overrides.
    pub fn new(
        definitions: impl IntoIterator<Item = SiteDefinition>,
        host_overrides: &HashMap<String, String>,
    ) -> Self {
        let sites = definitions
            .into_iter()
            .map(|def| {
                let host = host_overrides
                    .get(&def.site)
                    .map(String::as_str)
                    .unwrap_or(&def.base_url);
                let scheme = if def.is_https >= 1 { "https" } else { "http" };
                let entry = SiteEntry {
                    origin: format!("{}://{}", scheme, host.trim_end_matches('/')),
                    details_page: def.details_page,
                    download_page: def.download_page,
                };
                (def.site, entry)
            })
            .collect();

        Self { sites }
    }

    /// Parse a JSON site table.
    pub fn from_json(json: &str, host_overrides: &HashMap<String, String>) -> Result<Self> {
        let definitions = match serde_json::from_str::<SiteTable>(json)? {
            SiteTable::Envelope { data } => data.sites,
            SiteTable::List(sites) => sites,
        };
        Ok(Self::new(definitions, host_overrides))
    }

    /// Load a JSON site table from disk.
    pub fn load(path: impl AsRef<Path>, host_overrides: &HashMap<String, String>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let directory = Self::from_json(&content, host_overrides)?;
        log::info!(
            "Loaded {} site definitions from {}",
            directory.len(),
            path.as_ref().display()
        );
        Ok(directory)
    }

    /// Fetch the site table from the IYUU sites API.
    ///
    /// Uses the same client settings as the feed, including
    /// `insecure_skip_verify`.
    pub async fn fetch(feed: &FeedConfig, sites: &SitesConfig) -> Result<Self> {
        let api_url = sites
            .api_url
            .as_deref()
            .ok_or_else(|| AppError::config("sites.api_url is not configured"))?;
        let sign = sites
            .sign
            .as_deref()
            .ok_or_else(|| AppError::config("sites.sign is not configured (IYUU_SIGN)"))?;

        let mut url = Url::parse(api_url)?;
        url.query_pairs_mut()
            .append_pair("service", SITES_SERVICE)
            .append_pair("sign", sign)
            .append_pair("version", SITES_API_VERSION);

        log::info!("Fetching site table from {}", api_url);
        let client = http::create_async_client(feed)?;
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, feed.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()).into());
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(e, feed.timeout_secs))?;

        let envelope: serde_json::Value = serde_json::from_str(&body)?;
        if let Some(ret) = envelope.get("ret").and_then(serde_json::Value::as_i64) {
            if ret != 200 {
                let msg = envelope.get("msg").and_then(|m| m.as_str()).unwrap_or_default();
                return Err(AppError::validation(format!(
                    "sites API refused the request (ret {}): {}",
                    ret, msg
                )));
            }
        }

        let directory = Self::from_json(&body, &sites.host_overrides)?;
        log::info!("Fetched {} site definitions", directory.len());
        Ok(directory)
    }

    /// Build the directory the configuration asks for.
    ///
    /// A local `sites.file` wins over the API. Returns `None` when neither a
    /// file nor a sign is configured.
    pub async fn from_config(config: &Config) -> Result<Option<Self>> {
        if let Some(path) = &config.sites.file {
            return Ok(Some(Self::load(path, &config.sites.host_overrides)?));
        }
        if config.sites.sign.is_some() && config.sites.api_url.is_some() {
            return Ok(Some(Self::fetch(&config.feed, &config.sites).await?));
        }
        Ok(None)
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Resolve the details and download links for a record.
    pub fn resolve(&self, site_name: &str, id: &str) -> Option<SiteLinks> {
        let entry = self.sites.get(site_name)?;

        let details_url = format!(
            "{}/{}",
            entry.origin,
            entry.details_page.replace(ID_PLACEHOLDER, id)
        );

        let download_url = entry
            .download_page
            .contains(DOWNLOAD_MARKER)
            .then(|| {
                let page = DOWNLOAD_STRIP
                    .iter()
                    .fold(entry.download_page.replace(ID_PLACEHOLDER, id), |page, strip| {
                        page.replace(*strip, "")
                    });
                format!("{}/{}", entry.origin, page)
            });

        Some(SiteLinks {
            details_url,
            download_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"{
        "ret": 200,
        "data": {
            "sites": [
                {
                    "id": 1,
                    "site": "keepfrds",
                    "nickname": "朋友",
                    "base_url": "pt.keepfrds.com",
                    "download_page": "download.php?id={}&passkey={passkey}",
                    "details_page": "details.php?id={}",
                    "is_https": 2,
                    "cookie_required": 0
                },
                {
                    "site": "plain",
                    "base_url": "plain.example.org/",
                    "download_page": "api/dl/{}",
                    "details_page": "torrents/{}",
                    "is_https": 0
                },
                {
                    "site": "m-team",
                    "base_url": "xp.m-team.io",
                    "download_page": "download.php?id={}&passkey={passkey}&downhash={downHash}",
                    "details_page": "detail/{}",
                    "is_https": 1
                }
            ]
        },
        "msg": ""
    }"#;

    fn overrides() -> HashMap<String, String> {
        HashMap::from([("m-team".to_string(), "kp.m-team.cc".to_string())])
    }

    #[test]
    fn test_resolve_details_and_download() {
        let directory = SiteDirectory::from_json(TABLE, &overrides()).unwrap();
        assert_eq!(directory.len(), 3);

        let links = directory.resolve("keepfrds", "42").unwrap();
        assert_eq!(links.details_url, "https://pt.keepfrds.com/details.php?id=42");
        assert_eq!(
            links.download_url.as_deref(),
            Some("https://pt.keepfrds.com/download.php?id=42")
        );
    }

    #[test]
    fn test_resolve_without_download_php() {
        let directory = SiteDirectory::from_json(TABLE, &HashMap::new()).unwrap();
        let links = directory.resolve("plain", "7").unwrap();

        assert_eq!(links.details_url, "http://plain.example.org/torrents/7");
        assert_eq!(links.download_url, None);
    }

    #[test]
    fn test_host_override() {
        let directory = SiteDirectory::from_json(TABLE, &overrides()).unwrap();
        let links = directory.resolve("m-team", "9").unwrap();

        assert_eq!(links.details_url, "https://kp.m-team.cc/detail/9");
        assert_eq!(
            links.download_url.as_deref(),
            Some("https://kp.m-team.cc/download.php?id=9")
        );
    }

    #[test]
    fn test_bare_list_and_unknown_site() {
        let json = r#"[{"site": "a", "base_url": "a.org", "details_page": "d/{}", "is_https": 1}]"#;
        let directory = SiteDirectory::from_json(json, &HashMap::new()).unwrap();

        assert!(directory.resolve("a", "1").is_some());
        assert!(directory.resolve("missing", "1").is_none());
    }

    mod remote {
        use super::*;
        use crate::error::{AppError, FetchError};
        use crate::models::{Config, FeedConfig, SitesConfig};
        use wiremock::matchers::{method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        fn sites_config(server: &MockServer, sign: Option<&str>) -> SitesConfig {
            SitesConfig {
                api_url: Some(format!("{}/index.php", server.uri())),
                sign: sign.map(str::to_string),
                host_overrides: overrides(),
                ..SitesConfig::default()
            }
        }

        #[tokio::test]
        async fn test_fetch_signed_table() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/index.php"))
                .and(query_param("service", "App.Api.Sites"))
                .and(query_param("sign", "token-1"))
                .and(query_param("version", "2.0.0"))
                .respond_with(ResponseTemplate::new(200).set_body_string(TABLE))
                .expect(1)
                .mount(&server)
                .await;

            let directory =
                SiteDirectory::fetch(&FeedConfig::default(), &sites_config(&server, Some("token-1")))
                    .await
                    .unwrap();

            assert_eq!(directory.len(), 3);
            assert_eq!(
                directory.resolve("m-team", "1").unwrap().details_url,
                "https://kp.m-team.cc/detail/1"
            );
        }

        #[tokio::test]
        async fn test_fetch_refused_sign() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_string(r#"{"ret": 401, "data": [], "msg": "sign invalid"}"#),
                )
                .mount(&server)
                .await;

            let err = SiteDirectory::fetch(&FeedConfig::default(), &sites_config(&server, Some("bad")))
                .await
                .unwrap_err();
            assert!(err.to_string().contains("sign invalid"));
        }

        #[tokio::test]
        async fn test_fetch_http_error() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(502))
                .mount(&server)
                .await;

            let err = SiteDirectory::fetch(&FeedConfig::default(), &sites_config(&server, Some("x")))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Fetch(FetchError::Status(502))));
        }

        #[tokio::test]
        async fn test_from_config_without_source() {
            let config = Config::default();
            assert!(config.sites.sign.is_none());
            assert!(SiteDirectory::from_config(&config).await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_from_config_uses_sign() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(query_param("sign", "env-sign"))
                .respond_with(ResponseTemplate::new(200).set_body_string(TABLE))
                .expect(1)
                .mount(&server)
                .await;

            let mut config = Config::default();
            config.sites = sites_config(&server, None);
            config.apply_overrides(|key| (key == "IYUU_SIGN").then(|| "env-sign".to_string()));

            let directory = SiteDirectory::from_config(&config).await.unwrap().unwrap();
            assert!(directory.resolve("keepfrds", "1").is_some());
        }
    }
}
