//! Circuit Breaker pattern implementation.
//!
//! Prevents a bad upstream response from replacing a good snapshot: the
//! write is aborted when the new record count is zero, or when it dropped
//! by more than the configured percentage compared to the stored snapshot.
//!
//! A drop refused `rebaseline_after` runs in a row is accepted on the next
//! run, so a feed that legitimately shrank becomes the new baseline instead
//! of being refused forever. Empty results are always refused.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{AppError, Result};
use crate::models::GuardConfig;

/// Circuit breaker for preventing bad data updates.
///
/// Clones share the refusal counter.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    /// Maximum allowed drop percentage (0-100)
    max_drop_percent: u8,
    /// Below this previous count the drop check is skipped
    min_baseline: usize,
    /// Consecutive drop refusals before a drop is accepted
    rebaseline_after: u32,
    refusals: Arc<AtomicU32>,
}

/// Result of circuit breaker check.
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitBreakerResult {
    /// Safe to proceed with the write
    Safe {
        current_count: usize,
        previous_count: usize,
    },
    /// No previous snapshot, or one below the baseline
    ColdStart { current_count: usize },
    /// A large drop accepted as the new baseline
    Rebaselined {
        current_count: usize,
        previous_count: usize,
        drop_percent: f64,
        forced: bool,
    },
    /// Circuit breaker triggered - abort write
    Triggered {
        current_count: usize,
        previous_count: usize,
        drop_percent: f64,
    },
    /// Empty result - critical failure
    EmptyResult,
}

impl CircuitBreaker {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            max_drop_percent: config.max_drop_percent,
            min_baseline: config.min_baseline,
            rebaseline_after: config.rebaseline_after,
            refusals: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Number of drop refusals since the last accepted run.
    pub fn consecutive_refusals(&self) -> u32 {
        self.refusals.load(Ordering::SeqCst)
    }

    /// Compare the new record count with the stored one, if any.
    pub fn check(&self, current_count: usize, previous_count: Option<usize>) -> CircuitBreakerResult {
        self.evaluate(current_count, previous_count, false)
    }

    fn evaluate(
        &self,
        current_count: usize,
        previous_count: Option<usize>,
        force: bool,
    ) -> CircuitBreakerResult {
        if current_count == 0 {
            return CircuitBreakerResult::EmptyResult;
        }

        let previous_count = match previous_count {
            Some(count) if count >= self.min_baseline => count,
            _ => return CircuitBreakerResult::ColdStart { current_count },
        };

        if current_count < previous_count {
            let drop = previous_count - current_count;
            let drop_percent = (drop as f64 / previous_count as f64) * 100.0;

            if drop_percent > self.max_drop_percent as f64 {
                if force || self.consecutive_refusals() >= self.rebaseline_after {
                    return CircuitBreakerResult::Rebaselined {
                        current_count,
                        previous_count,
                        drop_percent,
                        forced: force,
                    };
                }
                return CircuitBreakerResult::Triggered {
                    current_count,
                    previous_count,
                    drop_percent,
                };
            }
        }

        CircuitBreakerResult::Safe {
            current_count,
            previous_count,
        }
    }

    /// Validate and return Ok if safe, Err if circuit breaker triggered.
    pub fn validate(&self, current_count: usize, previous_count: Option<usize>) -> Result<()> {
        self.enforce(self.evaluate(current_count, previous_count, false))
    }

    /// Like [`validate`](Self::validate), but a large drop is accepted
    /// immediately. Empty results are still refused.
    pub fn validate_forced(&self, current_count: usize, previous_count: Option<usize>) -> Result<()> {
        self.enforce(self.evaluate(current_count, previous_count, true))
    }

    fn enforce(&self, result: CircuitBreakerResult) -> Result<()> {
        match result {
            CircuitBreakerResult::Safe {
                current_count,
                previous_count,
            } => {
                log::info!(
                    "Circuit breaker: SAFE ({} records, was {})",
                    current_count,
                    previous_count
                );
                self.refusals.store(0, Ordering::SeqCst);
                Ok(())
            }
            CircuitBreakerResult::ColdStart { current_count } => {
                log::info!(
                    "Circuit breaker: COLD START ({} records, no usable baseline)",
                    current_count
                );
                self.refusals.store(0, Ordering::SeqCst);
                Ok(())
            }
            CircuitBreakerResult::Rebaselined {
                current_count,
                previous_count,
                drop_percent,
                forced,
            } => {
                let why = if forced { "forced" } else { "repeated drop" };
                log::warn!(
                    "Circuit breaker: REBASELINE ({}) {} → {} records ({:.1}% drop)",
                    why,
                    previous_count,
                    current_count,
                    drop_percent
                );
                self.refusals.store(0, Ordering::SeqCst);
                Ok(())
            }
            CircuitBreakerResult::Triggered {
                current_count,
                previous_count,
                drop_percent,
            } => {
                let refusals = self.refusals.fetch_add(1, Ordering::SeqCst) + 1;
                log::error!(
                    "Circuit breaker: TRIGGERED! {} → {} records ({:.1}% drop > {}% threshold, refusal {}/{})",
                    previous_count,
                    current_count,
                    drop_percent,
                    self.max_drop_percent,
                    refusals,
                    self.rebaseline_after
                );
                Err(AppError::circuit_breaker(format!(
                    "record count dropped {:.1}% ({} → {})",
                    drop_percent, previous_count, current_count
                )))
            }
            CircuitBreakerResult::EmptyResult => {
                log::error!("Circuit breaker: EMPTY RESULT - aborting write");
                Err(AppError::circuit_breaker("feed produced no records"))
            }
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(&GuardConfig::default())
    }
}
