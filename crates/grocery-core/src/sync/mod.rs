//! Synchronization between the local store and the backend
//!
//! A full sync first drains queued mirror writes, then pulls the backend
//! snapshot and merges it record by record with last-write-wins on
//! `updated_at`. The completion stamp is written only after a merge commits.

mod coordinator;
mod merge;
mod mirror;
mod single_flight;

pub use coordinator::SyncCoordinator;
pub use merge::{decide, merge_records, merge_snapshot, MergeDecision};
pub use mirror::{DeliveryOutcome, DrainReport, MirrorDispatcher};
pub use single_flight::SingleFlight;

use thiserror::Error;

use crate::remote::RemoteError;

/// Why a sync did not complete
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Fetching the snapshot failed; nothing was written locally
    #[error("Sync failed: {0}")]
    Remote(#[from] RemoteError),

    /// Applying the snapshot failed and was rolled back
    #[error("Merge failed: {0}")]
    Merge(String),

    /// The sync stamp could not be read or written
    #[error("Sync state storage failed: {0}")]
    Storage(String),

    #[error("Sync task failed: {0}")]
    Background(String),
}

impl SyncError {
    fn merge(error: crate::Error) -> Self {
        match error {
            crate::Error::Background(message) => Self::Background(message),
            other => Self::Merge(other.to_string()),
        }
    }

    fn storage(error: crate::Error) -> Self {
        match error {
            crate::Error::Background(message) => Self::Background(message),
            other => Self::Storage(other.to_string()),
        }
    }
}

/// Per-kind merge tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeCounts {
    /// Absent locally
    pub inserted: usize,
    /// Remote copy was newer
    pub updated: usize,
    /// Local copy was as new or newer
    pub skipped: usize,
}

/// Result of a completed full sync
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub lists: MergeCounts,
    pub items: MergeCounts,
    /// Mirror writes delivered while draining the outbox
    pub mirrors_delivered: usize,
    /// Mirror writes still queued after the sync
    pub mirrors_pending: usize,
    /// Completion time (Unix ms)
    pub completed_at_ms: i64,
    pub duration_ms: i64,
}

/// What `smart_sync` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The last sync was too recent
    Skipped { since_last_ms: i64 },
    Completed(SyncReport),
}

impl SyncOutcome {
    pub const fn was_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}
