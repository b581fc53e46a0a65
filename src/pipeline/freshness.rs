// src/pipeline/freshness.rs

//! Staleness gate.
//!
//! Consumers call [`StalenessGate::ensure_fresh`] on their read path. When
//! the stored snapshot is older than the threshold, missing, or unreadable,
//! the pipeline runs before the call returns.

use std::sync::Arc;

use chrono::{Duration, FixedOffset};

use crate::error::{AppError, Result};
use crate::models::{FreshnessConfig, Snapshot};
use crate::pipeline::{Pipeline, RunSummary};
use crate::utils::clock::{Clock, SystemClock};
use crate::utils::parse_feed_time;

/// State of the stored snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    /// Within the threshold
    Fresh { age: Duration },
    /// Needs a refresh
    Stale { reason: String },
}

/// What `ensure_fresh` did.
#[derive(Debug, Clone)]
pub enum Freshness {
    /// Snapshot was fresh; nothing ran
    Fresh { age: Duration },
    /// A pipeline run replaced the snapshot
    Refreshed(RunSummary),
}

/// Lazily refreshes the snapshot on read.
#[derive(Clone)]
pub struct StalenessGate {
    pipeline: Pipeline,
    clock: Arc<dyn Clock>,
    max_age: Duration,
    feed_offset: FixedOffset,
}

impl StalenessGate {
    pub fn new(pipeline: Pipeline, config: &FreshnessConfig) -> Result<Self> {
        let max_age = i64::try_from(config.max_age_hours)
            .ok()
            .and_then(Duration::try_hours)
            .ok_or_else(|| {
                AppError::validation(format!(
                    "freshness.max_age_hours out of range: {}",
                    config.max_age_hours
                ))
            })?;

        Ok(Self {
            pipeline,
            clock: Arc::new(SystemClock),
            max_age,
            feed_offset: config.feed_offset()?,
        })
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Inspect the stored snapshot without refreshing.
    pub async fn staleness(&self) -> Staleness {
        let snapshot = match self.pipeline.store().read().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                return Staleness::Stale {
                    reason: e.to_string(),
                };
            }
        };

        let Some(created) = parse_feed_time(&snapshot.time, &self.feed_offset) else {
            return Staleness::Stale {
                reason: format!("unparsable snapshot time {:?}", snapshot.time),
            };
        };

        let age = self.clock.now() - created;
        if age > self.max_age {
            Staleness::Stale {
                reason: format!("snapshot is {}h old", age.num_hours()),
            }
        } else {
            Staleness::Fresh { age }
        }
    }

    /// Refresh the snapshot if it is stale.
    pub async fn ensure_fresh(&self) -> Result<Freshness> {
        match self.staleness().await {
            Staleness::Fresh { age } => {
                log::debug!("Snapshot is fresh ({}m old)", age.num_minutes());
                Ok(Freshness::Fresh { age })
            }
            Staleness::Stale { reason } => {
                log::info!("Snapshot stale ({}); refreshing", reason);
                let summary = self.pipeline.run().await?;
                Ok(Freshness::Refreshed(summary))
            }
        }
    }

    /// Read path for consumers.
    ///
    /// A failed refresh is logged and the last good snapshot is served.
    pub async fn read_fresh(&self) -> Result<Snapshot> {
        if let Err(e) = self.ensure_fresh().await {
            log::warn!("Refresh failed, serving last good snapshot: {}", e);
        }
        self.pipeline.store().read().await
    }
}
