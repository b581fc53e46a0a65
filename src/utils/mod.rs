//! Utility functions and helpers.

pub mod clock;
pub mod http;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

/// Timestamp layouts seen in the feed header, most specific first.
const FEED_TIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parse a feed header timestamp written at the given UTC offset.
pub fn parse_feed_time(text: &str, offset: &FixedOffset) -> Option<DateTime<Utc>> {
    let text = text.trim();
    FEED_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .and_then(|naive| offset.from_local_datetime(&naive).single())
        .map(|local| local.with_timezone(&Utc))
}
