//! Application configuration structures.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upstream feed retrieval
    #[serde(default)]
    pub feed: FeedConfig,

    /// Feed text layout
    #[serde(default)]
    pub parser: ParserConfig,

    /// Snapshot location and format
    #[serde(default)]
    pub storage: StorageConfig,

    /// Staleness threshold
    #[serde(default)]
    pub freshness: FreshnessConfig,

    /// Daily refresh timer
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Circuit breaker thresholds
    #[serde(default)]
    pub guard: GuardConfig,

    /// Site URL lookup table
    #[serde(default)]
    pub sites: SitesConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Recognized keys: `TOP1000_API_URL`, `INSECURE_SKIP_VERIFY`,
    /// `DATA_EXPIRE_HOURS`, `IYUU_SIGN`. Unparsable or out-of-range values
    /// are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("TOP1000_API_URL").filter(|v| !v.trim().is_empty()) {
            self.feed.url = url.trim().to_string();
        }

        if let Some(value) = lookup("INSECURE_SKIP_VERIFY") {
            match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => self.feed.insecure_skip_verify = true,
                "0" | "false" | "no" | "" => self.feed.insecure_skip_verify = false,
                other => log::warn!("Ignoring INSECURE_SKIP_VERIFY={other:?}"),
            }
        }

        if let Some(value) = lookup("DATA_EXPIRE_HOURS") {
            match value.trim().parse::<u64>() {
                Ok(hours) if (1..=FreshnessConfig::MAX_AGE_HOURS_LIMIT).contains(&hours) => {
                    self.freshness.max_age_hours = hours
                }
                Ok(hours) => log::warn!(
                    "Ignoring DATA_EXPIRE_HOURS={hours}: must be within 1-{}",
                    FreshnessConfig::MAX_AGE_HOURS_LIMIT
                ),
                Err(e) => log::warn!("Ignoring DATA_EXPIRE_HOURS={value:?}: {e}"),
            }
        }

        if let Some(sign) = lookup("IYUU_SIGN").filter(|v| !v.trim().is_empty()) {
            self.sites.sign = Some(sign.trim().to_string());
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.feed.url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::validation(format!(
                "feed.url must be http(s), got {}",
                url.scheme()
            )));
        }
        if self.feed.user_agent.trim().is_empty() {
            return Err(AppError::validation("feed.user_agent is empty"));
        }
        if self.feed.timeout_secs == 0 {
            return Err(AppError::validation("feed.timeout_secs must be > 0"));
        }
        if self.parser.lines_per_group < ParserConfig::MIN_LINES_PER_GROUP {
            return Err(AppError::validation(format!(
                "parser.lines_per_group must be >= {}",
                ParserConfig::MIN_LINES_PER_GROUP
            )));
        }
        if self.storage.file_name.trim().is_empty() {
            return Err(AppError::validation("storage.file_name is empty"));
        }
        if !(1..=FreshnessConfig::MAX_AGE_HOURS_LIMIT).contains(&self.freshness.max_age_hours) {
            return Err(AppError::validation(format!(
                "freshness.max_age_hours must be within 1-{}",
                FreshnessConfig::MAX_AGE_HOURS_LIMIT
            )));
        }
        self.freshness.feed_offset()?;
        self.schedule.daily_time()?;
        if self.guard.max_drop_percent > 100 {
            return Err(AppError::validation(
                "guard.max_drop_percent must be within 0-100",
            ));
        }
        if let Some(url) = &self.sites.api_url {
            Url::parse(url)?;
        }
        Ok(())
    }
}

/// Upstream feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Feed endpoint
    #[serde(default = "defaults::feed_url")]
    pub url: String,

    /// User-Agent header for the request
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Accept invalid TLS certificates from the endpoint
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: defaults::feed_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            insecure_skip_verify: false,
        }
    }
}

/// Feed layout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Lines per record group. Current upstream uses 3; older feeds used 5.
    #[serde(default = "defaults::lines_per_group")]
    pub lines_per_group: usize,
}

impl ParserConfig {
    /// Site line, duplication line and size line.
    pub const MIN_LINES_PER_GROUP: usize = 3;
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            lines_per_group: defaults::lines_per_group(),
        }
    }
}

/// Snapshot storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory served as static assets
    #[serde(default = "defaults::storage_dir")]
    pub dir: PathBuf,

    /// Snapshot file name inside `dir`
    #[serde(default = "defaults::file_name")]
    pub file_name: String,

    /// Indent the JSON document
    #[serde(default)]
    pub pretty: bool,
}

impl StorageConfig {
    /// Full path of the snapshot document.
    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: defaults::storage_dir(),
            file_name: defaults::file_name(),
            pretty: false,
        }
    }
}

/// Staleness settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreshnessConfig {
    /// Snapshots older than this are refreshed on read
    #[serde(default = "defaults::max_age_hours")]
    pub max_age_hours: u64,

    /// UTC offset the feed header timestamp is written in
    #[serde(default = "defaults::utc_offset_hours")]
    pub utc_offset_hours: i32,
}

impl FreshnessConfig {
    /// One year.
    pub const MAX_AGE_HOURS_LIMIT: u64 = 24 * 366;

    /// Offset used to interpret the header timestamp.
    pub fn feed_offset(&self) -> Result<FixedOffset> {
        self.utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                AppError::validation(format!(
                    "freshness.utc_offset_hours out of range: {}",
                    self.utc_offset_hours
                ))
            })
    }
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            max_age_hours: defaults::max_age_hours(),
            utc_offset_hours: defaults::utc_offset_hours(),
        }
    }
}

/// Daily timer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Local wall-clock time of the daily run, `HH:MM`
    #[serde(default = "defaults::daily_at")]
    pub daily_at: String,

    /// Run the pipeline once when the scheduler starts
    #[serde(default = "defaults::run_on_start")]
    pub run_on_start: bool,
}

impl ScheduleConfig {
    pub fn daily_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(self.daily_at.trim(), "%H:%M").map_err(|e| {
            AppError::validation(format!(
                "schedule.daily_at must be HH:MM, got {:?}: {}",
                self.daily_at, e
            ))
        })
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            daily_at: defaults::daily_at(),
            run_on_start: defaults::run_on_start(),
        }
    }
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Maximum allowed drop in record count, percent
    #[serde(default = "defaults::max_drop_percent")]
    pub max_drop_percent: u8,

    /// Previous counts below this skip the drop check
    #[serde(default = "defaults::min_baseline")]
    pub min_baseline: usize,

    /// Refused drops in a row after which the next one is accepted
    #[serde(default = "defaults::rebaseline_after")]
    pub rebaseline_after: u32,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_drop_percent: defaults::max_drop_percent(),
            min_baseline: defaults::min_baseline(),
            rebaseline_after: defaults::rebaseline_after(),
        }
    }
}

/// Site lookup table settings.
///
/// The table is read from `file` when set, otherwise fetched from `api_url`
/// when a `sign` is configured. Resolution is disabled when neither is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitesConfig {
    /// Local JSON site-definition table
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// IYUU API endpoint serving the site table
    #[serde(default = "defaults::sites_api_url_opt")]
    pub api_url: Option<String>,

    /// IYUU API token
    #[serde(default)]
    pub sign: Option<String>,

    /// Host to use instead of a site's `base_url`
    #[serde(default)]
    pub host_overrides: HashMap<String, String>,
}

impl Default for SitesConfig {
    fn default() -> Self {
        Self {
            file: None,
            api_url: defaults::sites_api_url_opt(),
            sign: None,
            host_overrides: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log filter when `RUST_LOG` is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Feed defaults
    pub fn feed_url() -> String {
        "https://api.iyuu.cn/top1000.php".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; top1000/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    pub fn lines_per_group() -> usize {
        3
    }

    // Storage defaults
    pub fn storage_dir() -> PathBuf {
        PathBuf::from("public")
    }
    pub fn file_name() -> String {
        "top1000.json".into()
    }

    // Freshness defaults
    pub fn max_age_hours() -> u64 {
        24
    }
    pub fn utc_offset_hours() -> i32 {
        8
    }

    // Schedule defaults
    pub fn daily_at() -> String {
        "09:00".into()
    }
    pub fn run_on_start() -> bool {
        true
    }

    // Guard defaults
    pub fn max_drop_percent() -> u8 {
        20
    }
    pub fn min_baseline() -> usize {
        10
    }
    pub fn rebaseline_after() -> u32 {
        1
    }

    // Sites defaults
    pub fn sites_api_url_opt() -> Option<String> {
        Some("https://api.iyuu.cn/index.php".into())
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn default_cert_validation_enabled() {
        assert!(!Config::default().feed.insecure_skip_verify);
    }

    #[test]
    fn validate_rejects_bad_url() {
        let mut config = Config::default();
        config.feed.url = "not a url".to_string();
        assert!(config.validate().is_err());

        config.feed.url = "ftp://example.com/feed".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_small_groups() {
        let mut config = Config::default();
        config.parser.lines_per_group = 2;
        assert!(config.validate().is_err());

        config.parser.lines_per_group = 5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_schedule() {
        let mut config = Config::default();
        config.schedule.daily_at = "25:00".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [feed]
            timeout_secs = 5

            [storage]
            dir = "static"
            pretty = true

            [sites.host_overrides]
            m-team = "kp.m-team.cc"
            "#,
        )
        .unwrap();

        assert_eq!(config.feed.timeout_secs, 5);
        assert_eq!(config.feed.url, "https://api.iyuu.cn/top1000.php");
        assert_eq!(config.storage.snapshot_path(), PathBuf::from("static/top1000.json"));
        assert!(config.storage.pretty);
        assert_eq!(config.parser.lines_per_group, 3);
        assert_eq!(
            config.sites.host_overrides.get("m-team").map(String::as_str),
            Some("kp.m-team.cc")
        );
    }

    #[test]
    fn apply_overrides() {
        let mut config = Config::default();
        config.apply_overrides(|key| match key {
            "TOP1000_API_URL" => Some("http://localhost:9000/feed".to_string()),
            "INSECURE_SKIP_VERIFY" => Some("true".to_string()),
            "DATA_EXPIRE_HOURS" => Some("nope".to_string()),
            _ => None,
        });

        assert_eq!(config.feed.url, "http://localhost:9000/feed");
        assert!(config.feed.insecure_skip_verify);
        assert_eq!(config.freshness.max_age_hours, 24);
    }

    #[test]
    fn validate_rejects_out_of_range_age() {
        let mut config = Config::default();
        config.freshness.max_age_hours = 10_000_000_000_000_000;
        assert!(config.validate().is_err());

        config.freshness.max_age_hours = FreshnessConfig::MAX_AGE_HOURS_LIMIT;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn feed_offset_rejects_overflow() {
        let freshness = FreshnessConfig {
            utc_offset_hours: i32::MAX,
            ..FreshnessConfig::default()
        };
        assert!(freshness.feed_offset().is_err());

        let freshness = FreshnessConfig {
            utc_offset_hours: 25,
            ..FreshnessConfig::default()
        };
        assert!(freshness.feed_offset().is_err());
    }

    #[test]
    fn apply_overrides_range_checks_age_and_reads_sign() {
        let mut config = Config::default();
        config.apply_overrides(|key| match key {
            "DATA_EXPIRE_HOURS" => Some("18446744073709551615".to_string()),
            "IYUU_SIGN" => Some(" abc123 ".to_string()),
            _ => None,
        });
        assert_eq!(config.freshness.max_age_hours, 24);
        assert_eq!(config.sites.sign.as_deref(), Some("abc123"));

        config.apply_overrides(|key| (key == "DATA_EXPIRE_HOURS").then(|| "48".to_string()));
        assert_eq!(config.freshness.max_age_hours, 48);
    }
}
