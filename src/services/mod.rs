//! Service layer for the ingestion service.
//!
//! This module contains the building blocks the pipeline composes:
//! - Feed retrieval (`HttpFeedClient` behind `FeedSource`)
//! - Feed text parsing (`FeedParser`)
//! - Site URL lookup (`SiteDirectory`)

mod feed;
pub mod parser;
mod sites;

pub use feed::{FeedSource, HttpFeedClient};
pub use parser::{FeedParser, ParsedFeed, SkippedGroup};
pub use sites::SiteDirectory;
