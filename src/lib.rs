//! solace - resumable streaming batch generation of empathetic answers.
//!
//! ## Architecture
//!
//! - **Record Source**: the input dataset, loaded wholesale
//! - **Checkpoint Store**: append-only JSONL output log; ids already in it
//!   are skipped on the next run
//! - **Streaming Response Accumulator**: reduces streamed fragments to the
//!   final answer, dropping reasoning
//! - **Batch Driver**: processes records one at a time and classifies
//!   failures into skip-this-record or abort-the-run
//!
//! Re-running after a crash or a fatal stop resumes from the unfinished tail.

pub mod checkpoint;
pub mod client;
pub mod models;
pub mod pipeline;

// Re-exports for convenience
pub use checkpoint::{CheckpointSet, CheckpointStore};
pub use client::{CompletionClient, CompletionRequest, FragmentStream, LlmClient, Message};
pub use models::{
    ApiError, Config, Disposition, ProcessedResult, Record, RecordId, Result, RunOutcome,
    RunReport, SolaceError, StreamFragment,
};
pub use pipeline::{BatchDriver, PromptBuilder, RecordSource, ResponseAccumulator};
