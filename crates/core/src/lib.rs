//! Rewind Core - storage primitives for the rewind versioning engine
//!
//! This crate provides the foundational layer shared by the journal,
//! watcher and CLI crates:
//! - BLAKE3 content hashing
//! - Second-granularity, sortable timestamps
//! - Filesystem change events
//! - The snapshot content store
//! - The error taxonomy used across the engine

pub mod error;
pub mod event;
pub mod fsutil;
pub mod hash;
pub mod snapshot;
pub mod timestamp;

// Re-export main types for convenience
pub use error::{ErrorKind, IoContext, Result, RewindError};
pub use event::{EventPath, FsEvent};
pub use hash::{hash_bytes, hash_file, ContentHash};
pub use snapshot::{SnapshotRef, SnapshotStore};
pub use timestamp::Timestamp;
