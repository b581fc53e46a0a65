// src/models/mod.rs

//! Domain models for the ingestion service.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod site;
mod snapshot;

// Re-export all public types
pub use config::{
    Config, FeedConfig, FreshnessConfig, GuardConfig, LoggingConfig, ParserConfig,
    ScheduleConfig, SitesConfig, StorageConfig,
};
pub use site::{SiteDefinition, SiteLinks};
pub use snapshot::{SiteRecord, Snapshot};
