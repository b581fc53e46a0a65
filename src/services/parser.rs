// src/services/parser.rs

//! Feed text parser.
//!
//! The upstream feed is plain text:
//!
//! ```text
//! create time 2025-12-11 07:52:33 by https://api.iyuu.cn/
//! <reserved line>
//! 站名：SiteA 【ID：123】
//! 重复度：5%
//! 文件大小：1.2GB
//! 站名：SiteB 【ID：456】
//! ...
//! ```
//!
//! Record groups whose first line does not look like a site line are
//! skipped and reported back to the caller instead of failing the parse.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::{ParserConfig, SiteRecord, Snapshot};

const TIME_PREFIX: &str = "create time ";
const TIME_SUFFIX: &str = " by ";
const FIELD_SEPARATOR: char = '：';

/// Header line index and first data line index.
const HEADER_LINE: usize = 0;
const DATA_START_LINE: usize = 2;

/// Compiled site-line pattern
static SITE_LINE: OnceLock<Regex> = OnceLock::new();

fn site_line() -> &'static Regex {
    SITE_LINE.get_or_init(|| {
        Regex::new(r"站名：(.*?) 【ID：(\d+)】").expect("site line pattern is valid")
    })
}

/// A record group dropped because its first line did not match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedGroup {
    /// 0-based group index among data groups
    pub index: usize,
    /// The offending first line
    pub line: String,
}

/// Parser output: the snapshot plus what was left out of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFeed {
    pub snapshot: Snapshot,
    pub skipped: Vec<SkippedGroup>,
}

/// Parser for the plain-text feed.
#[derive(Debug, Clone)]
pub struct FeedParser {
    lines_per_group: usize,
}

impl Default for FeedParser {
    fn default() -> Self {
        Self::new(&ParserConfig::default())
    }
}

impl FeedParser {
    /// Create a parser for the configured group layout.
    ///
    /// Group sizes below the minimum are raised to it.
    pub fn new(config: &ParserConfig) -> Self {
        Self {
            lines_per_group: config
                .lines_per_group
                .max(ParserConfig::MIN_LINES_PER_GROUP),
        }
    }

    /// Parse raw feed text.
    pub fn parse(&self, raw: &str) -> ParsedFeed {
        let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
        let lines: Vec<&str> = normalized.split('\n').collect();

        let time = lines
            .get(HEADER_LINE)
            .map(|line| extract_time(line))
            .unwrap_or_default();
        let data_lines = lines.get(DATA_START_LINE..).unwrap_or_default();

        let mut items = Vec::new();
        let mut skipped = Vec::new();

        for (index, group) in data_lines.chunks(self.lines_per_group).enumerate() {
            if group.iter().all(|line| line.trim().is_empty()) {
                continue;
            }

            let ordinal_id = items.len() as u32 + 1;
            match self.parse_group(group, ordinal_id) {
                Some(record) => items.push(record),
                None => skipped.push(SkippedGroup {
                    index,
                    line: group[0].to_string(),
                }),
            }
        }

        let remainder = data_lines.len() % self.lines_per_group;
        if remainder != 0 {
            log::debug!("Feed ends with a partial group of {} lines", remainder);
        }

        let snapshot = Snapshot::new(time, items);
        ParsedFeed { snapshot, skipped }
    }

    fn parse_group(&self, group: &[&str], ordinal_id: u32) -> Option<SiteRecord> {
        let captures = site_line().captures(group.first()?)?;

        let field = |offset: usize| {
            group
                .get(offset)
                .map(|line| extract_field_value(line))
                .unwrap_or_default()
        };

        Some(SiteRecord {
            site_name: captures[1].to_string(),
            site_id: captures[2].to_string(),
            duplication_count: field(1),
            file_size: field(self.lines_per_group - 1),
            ordinal_id,
        })
    }
}

/// Parse raw feed text with the default 3-line layout.
pub fn parse(raw: &str) -> ParsedFeed {
    FeedParser::default().parse(raw)
}

/// Strip the header prefix and everything from the source suffix on.
pub fn extract_time(header: &str) -> String {
    let header = header.strip_prefix(TIME_PREFIX).unwrap_or(header);
    let header = match header.find(TIME_SUFFIX) {
        Some(idx) => &header[..idx],
        None => header,
    };
    header.to_string()
}

/// Text after the first full-width colon, trimmed.
fn extract_field_value(line: &str) -> String {
    line.split(FIELD_SEPARATOR)
        .nth(1)
        .map(|value| value.trim().to_string())
        .unwrap_or_default()
}
