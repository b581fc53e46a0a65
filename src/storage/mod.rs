//! Storage abstractions for snapshot persistence.
//!
//! The snapshot is a single JSON document living in the directory that is
//! also served as static assets, so the stored file doubles as the public
//! read API.
//!
//! ## Directory Structure
//!
//! ```text
//! public/
//! └── top1000.json          # Latest snapshot, replaced atomically
//! ```

pub mod local;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Snapshot;

// Re-export for convenience
pub use local::LocalStorage;

/// Trait for snapshot storage backends.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Replace the stored snapshot.
    ///
    /// Implementations must be atomic: readers see either the previous
    /// document or the new one, never a partial write.
    async fn write(&self, snapshot: &Snapshot) -> Result<()>;

    /// Read the stored snapshot.
    ///
    /// Fails with `StoreError::Missing` or `StoreError::Corrupt`.
    async fn read(&self) -> Result<Snapshot>;

    /// Human readable location, for logs.
    fn location(&self) -> String;
}
