//! Versioning engine over the rewind storage primitives
//!
//! This crate provides:
//! - File history records and branch timelines (sled embedded DB)
//! - Change capture: hash + snapshot + record for one filesystem event
//! - A bounded capture worker pool with per-path ordering
//! - Reconstruction: state at a time, diff between times, restore

pub mod capture;
pub mod pool;
pub mod reconstruct;
pub mod records;
pub mod store;

// Re-exports
pub use capture::{
    CaptureOutcome, CaptureStats, CaptureStatsSnapshot, ChangeCapture, Clock, SystemClock,
};
pub use pool::{CapturePool, CapturePoolConfig};
pub use reconstruct::{diff_states, ChangeKind, DiffEntry, Reconstructor, RestoreReport};
pub use records::{validate_branch, FileHistoryRecord, StateEntry, TimelineEvent, MAIN_BRANCH};
pub use store::MetadataStore;

pub use rewind_core::{Result, RewindError};
