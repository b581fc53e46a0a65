//! Tracker site definitions.

use serde::{Deserialize, Serialize};

/// One entry of the site-definition table.
///
/// Page templates contain `{}` where the torrent id goes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SiteDefinition {
    /// Site key as it appears in feed records
    pub site: String,

    #[serde(default)]
    pub nickname: String,

    /// Host (and optional path prefix) without scheme
    pub base_url: String,

    /// Details page template, e.g. `details.php?id={}`
    pub details_page: String,

    /// Download page template, e.g. `download.php?id={}&passkey={passkey}`
    #[serde(default)]
    pub download_page: String,

    /// Non-zero when the site is served over HTTPS
    #[serde(default)]
    pub is_https: u8,
}

/// Links for one record on its tracker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SiteLinks {
    pub details_url: String,
    pub download_url: Option<String>,
}
