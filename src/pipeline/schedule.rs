// src/pipeline/schedule.rs

//! Daily refresh timer.

use std::sync::Arc;

use chrono::{DateTime, Days, Local, NaiveTime, TimeZone};

use crate::error::Result;
use crate::models::ScheduleConfig;
use crate::pipeline::Pipeline;
use crate::utils::clock::{Clock, SystemClock};

/// Runs the pipeline at start-up and then once a day.
pub struct Scheduler {
    pipeline: Pipeline,
    clock: Arc<dyn Clock>,
    daily_at: NaiveTime,
    run_on_start: bool,
}

impl Scheduler {
    pub fn new(pipeline: Pipeline, config: &ScheduleConfig) -> Result<Self> {
        Ok(Self {
            pipeline,
            clock: Arc::new(SystemClock),
            daily_at: config.daily_time()?,
            run_on_start: config.run_on_start,
        })
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run until the surrounding task is dropped.
    ///
    /// Failed runs are logged and not retried before the next tick.
    pub async fn run_forever(&self) {
        if self.run_on_start {
            self.tick().await;
        }

        loop {
            let now = self.clock.now().with_timezone(&Local);
            let next = next_occurrence(&now, self.daily_at);
            log::info!("Next scheduled refresh at {}", next.format("%Y-%m-%d %H:%M:%S %Z"));

            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;
            self.tick().await;
        }
    }

    async fn tick(&self) {
        if let Err(e) = self.pipeline.run().await {
            log::error!("Scheduled refresh failed: {}", e);
        }
    }
}

/// The first instant strictly after `now` whose wall-clock time is `at`.
///
/// Days where `at` does not exist locally (DST gaps) are skipped.
pub fn next_occurrence<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();

    (0..=2u64)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .filter_map(|day| tz.from_local_datetime(&day.and_time(at)).earliest())
        .find(|candidate| candidate > now)
        .unwrap_or_else(|| now.clone() + chrono::Duration::days(1))
}
