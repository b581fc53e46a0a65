//! Pipeline entry points for ingestion.
//!
//! - `Pipeline`: single-flight fetch → parse → guard → persist
//! - `StalenessGate`: refresh on read when the snapshot is too old
//! - `Scheduler`: refresh at start-up and once a day

pub mod circuit_breaker;
pub mod diff;
pub mod freshness;
pub mod ingest;
pub mod schedule;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerResult};
pub use diff::{SiteDiff, calculate_diff};
pub use freshness::{Freshness, Staleness, StalenessGate};
pub use ingest::{Pipeline, RunSummary};
pub use schedule::{Scheduler, next_occurrence};
