// src/pipeline/ingest.rs

//! Feed ingestion: fetch → parse → guard → persist.
//!
//! Runs are single-flight. The scheduler and the staleness gate may both
//! trigger a refresh; a caller arriving while a run is in progress awaits
//! that run's result instead of starting another one.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{Config, Snapshot};
use crate::pipeline::{CircuitBreaker, SiteDiff, calculate_diff};
use crate::services::{FeedParser, FeedSource, HttpFeedClient, ParsedFeed};
use crate::storage::{LocalStorage, SnapshotStore};

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Header time of the stored snapshot
    pub time: String,
    pub item_count: usize,
    pub site_count: usize,
    /// Record groups dropped by the parser
    pub skipped_groups: usize,
    pub diff: SiteDiff,
    pub written_at: DateTime<Utc>,
}

type RunOutcome = std::result::Result<RunSummary, Arc<AppError>>;
type InFlight = Shared<BoxFuture<'static, RunOutcome>>;

/// The ingestion pipeline.
#[derive(Clone)]
pub struct Pipeline {
    source: Arc<dyn FeedSource>,
    store: Arc<dyn SnapshotStore>,
    parser: FeedParser,
    breaker: CircuitBreaker,
    in_flight: Arc<Mutex<Option<InFlight>>>,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn FeedSource>,
        store: Arc<dyn SnapshotStore>,
        parser: FeedParser,
        breaker: CircuitBreaker,
    ) -> Self {
        Self {
            source,
            store,
            parser,
            breaker,
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// Wire the HTTP feed client and local storage from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let source = HttpFeedClient::new(&config.feed)?;
        let store = LocalStorage::from_config(&config.storage);

        Ok(Self::new(
            Arc::new(source),
            Arc::new(store),
            FeedParser::new(&config.parser),
            CircuitBreaker::new(&config.guard),
        ))
    }

    /// The store this pipeline writes to.
    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    /// Run the pipeline, or join the run already in flight.
    pub async fn run(&self) -> Result<RunSummary> {
        self.run_with(false).await
    }

    /// Run the pipeline accepting any non-empty result, however much it
    /// shrank. A call that joins an in-flight run gets that run's result.
    pub async fn run_forced(&self) -> Result<RunSummary> {
        self.run_with(true).await
    }

    async fn run_with(&self, force: bool) -> Result<RunSummary> {
        let run = {
            let mut slot = self.lock_in_flight();
            match slot.as_ref() {
                Some(run) => {
                    log::info!("Ingestion already in progress; joining it");
                    run.clone()
                }
                None => {
                    let run = self.spawn_run(force);
                    *slot = Some(run.clone());
                    run
                }
            }
        };

        run.await
            .map_err(|err| Arc::try_unwrap(err).unwrap_or_else(AppError::Joined))
    }

    /// Build the shared future for a new run.
    ///
    /// The future clears the in-flight slot itself when it completes. While
    /// the slot is occupied, later callers join and drive the same future,
    /// including one abandoned by every earlier caller.
    fn spawn_run(&self, force: bool) -> InFlight {
        let this = self.clone();
        async move {
            let outcome = this.execute(force).await;
            if let Err(e) = &outcome {
                log::error!("Ingestion run failed, keeping previous snapshot: {}", e);
            }
            this.lock_in_flight().take();
            outcome.map_err(Arc::new)
        }
        .boxed()
        .shared()
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, Option<InFlight>> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn execute(&self, force: bool) -> Result<RunSummary> {
        log::info!("Ingestion run starting{}", if force { " (forced)" } else { "" });

        let raw = self.source.fetch().await?;
        let ParsedFeed { snapshot, skipped } = self.parser.parse(&raw);

        if !skipped.is_empty() {
            log::warn!("Skipped {} malformed record groups", skipped.len());
            for group in &skipped {
                log::debug!("Skipped group {}: {:?}", group.index, group.line);
            }
        }

        let previous = match self.store.read().await {
            Ok(previous) => Some(previous),
            Err(e) => {
                log::warn!("No usable previous snapshot: {}", e);
                None
            }
        };

        let previous_count = previous.as_ref().map(Snapshot::len);
        if force {
            self.breaker.validate_forced(snapshot.len(), previous_count)?;
        } else {
            self.breaker.validate(snapshot.len(), previous_count)?;
        }
        snapshot.validate()?;

        let diff = calculate_diff(previous.as_ref(), &snapshot);
        self.store.write(&snapshot).await?;

        if diff.has_changes() {
            log::info!(
                "Sites: {} added, {} removed, record count {:+}",
                diff.added.len(),
                diff.removed.len(),
                diff.count_delta
            );
        }

        let summary = RunSummary {
            time: snapshot.time.clone(),
            item_count: snapshot.len(),
            site_count: snapshot.site_names.len(),
            skipped_groups: skipped.len(),
            diff,
            written_at: Utc::now(),
        };

        log::info!(
            "Ingestion complete: {} records from {} sites (feed time {})",
            summary.item_count,
            summary.site_count,
            summary.time
        );

        Ok(summary)
    }
}
