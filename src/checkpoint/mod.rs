//! Checkpoint module for resumable batch runs.
//!
//! Provides:
//! - `CheckpointStore`: the append-only output log
//! - `CheckpointSet`: identifiers already persisted at run start

mod store;

pub use store::*;
