//! Snapshot data structures.
//!
//! The serialized form of [`Snapshot`] is the public read API: the JSON file
//! is served as a static asset, so field names follow the established
//! document layout rather than Rust naming.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// A single tracker listing parsed from the feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SiteRecord {
    /// Tracker site name
    #[serde(rename = "siteName")]
    pub site_name: String,

    /// Torrent id on that site
    #[serde(rename = "siteid")]
    pub site_id: String,

    /// Duplication count as published upstream (e.g. "5%")
    #[serde(rename = "duplication")]
    pub duplication_count: String,

    /// Human readable size (e.g. "1.2GB")
    #[serde(rename = "size")]
    pub file_size: String,

    /// 1-based position among successfully parsed records
    #[serde(rename = "id")]
    pub ordinal_id: u32,
}

/// The structured result of one feed, persisted as a single document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    /// Creation time taken from the feed header
    pub time: String,

    /// Parsed records in feed order
    #[serde(default)]
    pub items: Vec<SiteRecord>,

    /// Distinct site names in first-seen order
    #[serde(rename = "siteName", default)]
    pub site_names: Vec<String>,
}

impl Snapshot {
    /// Build a snapshot from records, deriving the site name list.
    pub fn new(time: impl Into<String>, items: Vec<SiteRecord>) -> Self {
        let mut seen = HashSet::new();
        let site_names = items
            .iter()
            .filter(|item| seen.insert(item.site_name.as_str()))
            .map(|item| item.site_name.clone())
            .collect();

        Self {
            time: time.into(),
            items,
            site_names,
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Check that the snapshot is worth publishing.
    ///
    /// Rejects a blank header time and an empty record list, and verifies
    /// the ordinal and site-name invariants.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.time.trim().is_empty() {
            errors.push("time is empty".to_string());
        }
        if self.items.is_empty() {
            errors.push("no records parsed".to_string());
        }

        for (index, item) in self.items.iter().enumerate() {
            let expected = index as u32 + 1;
            if item.ordinal_id != expected {
                errors.push(format!(
                    "record {} has id {}, expected {}",
                    index + 1,
                    item.ordinal_id,
                    expected
                ));
            }
            if item.site_name.trim().is_empty() {
                errors.push(format!("record {} has an empty site name", expected));
            }
            if !self.site_names.contains(&item.site_name) {
                errors.push(format!(
                    "site '{}' missing from site name list",
                    item.site_name
                ));
            }
        }

        let distinct: HashSet<_> = self.site_names.iter().collect();
        if distinct.len() != self.site_names.len() {
            errors.push("site name list contains duplicates".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation(errors.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(site: &str, id: u32) -> SiteRecord {
        SiteRecord {
            site_name: site.to_string(),
            site_id: "1".to_string(),
            duplication_count: "5%".to_string(),
            file_size: "1GB".to_string(),
            ordinal_id: id,
        }
    }

    #[test]
    fn test_new_dedups_site_names_in_order() {
        let snapshot = Snapshot::new(
            "2025-01-01 00:00",
            vec![record("b", 1), record("a", 2), record("b", 3)],
        );
        assert_eq!(snapshot.site_names, vec!["b", "a"]);
    }

    #[test]
    fn test_serialized_field_names() {
        let snapshot = Snapshot::new("2025-01-01 00:00", vec![record("ExampleSite", 1)]);
        let value = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(value["time"], "2025-01-01 00:00");
        assert_eq!(value["siteName"][0], "ExampleSite");
        let item = &value["items"][0];
        assert_eq!(item["siteName"], "ExampleSite");
        assert_eq!(item["siteid"], "1");
        assert_eq!(item["duplication"], "5%");
        assert_eq!(item["size"], "1GB");
        assert_eq!(item["id"], 1);
    }

    #[test]
    fn test_deserialize_without_site_name_list() {
        let json = r#"{"time":"2025-01-01 00:00","items":[]}"#;
        let snapshot: Snapshot = serde_json::from_str(json).unwrap();
        assert!(snapshot.site_names.is_empty());
    }

    #[test]
    fn test_validate() {
        let good = Snapshot::new("2025-01-01 00:00", vec![record("a", 1), record("b", 2)]);
        assert!(good.validate().is_ok());

        let empty = Snapshot::new("2025-01-01 00:00", Vec::new());
        assert!(matches!(empty.validate(), Err(AppError::Validation(_))));

        let no_time = Snapshot::new("  ", vec![record("a", 1)]);
        assert!(no_time.validate().is_err());

        let gap = Snapshot::new("2025-01-01 00:00", vec![record("a", 1), record("b", 3)]);
        assert!(gap.validate().is_err());
    }
}
