//! Record and result types for solace.
//!
//! These types carry the data flow through the pipeline:
//! dataset → `Record` → fragments → `ProcessedResult` → output log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque record identifier.
///
/// Datasets use either integer or string ids; the original JSON form is kept
/// so results round-trip into the output log unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{n}"),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Int(n)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId::Text(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        RecordId::Text(s)
    }
}

/// One unit of work from the input dataset.
///
/// Accepts `id` or the legacy `q_id` key; `id` wins when both are present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRecord")]
pub struct Record {
    /// Stable identifier, unique within the dataset
    pub id: RecordId,

    /// Question title
    pub title: String,

    /// Question description
    #[serde(default)]
    pub description: String,
}

impl Record {
    pub fn new(id: impl Into<RecordId>, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
        }
    }
}

#[derive(Deserialize)]
struct RawRecord {
    id: Option<RecordId>,
    q_id: Option<RecordId>,
    title: String,
    #[serde(default)]
    description: String,
}

impl TryFrom<RawRecord> for Record {
    type Error = String;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        let id = raw
            .id
            .or(raw.q_id)
            .ok_or_else(|| "missing field `id` (or `q_id`)".to_string())?;
        Ok(Self {
            id,
            title: raw.title,
            description: raw.description,
        })
    }
}

/// One line of the output log.
///
/// Created once per successfully processed record, serialized immediately and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedResult {
    /// Logs written by earlier tooling key this as `q_id`
    #[serde(alias = "q_id")]
    pub id: RecordId,
    /// Title as sent to the model (persona suffix included)
    pub title: String,
    pub description: String,
    pub answer: String,
}

/// Incremental piece of a streamed completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFragment {
    /// Internal deliberation; discarded
    Reasoning(String),
    /// User-facing content; appended to the answer
    Answer(String),
}

impl StreamFragment {
    pub fn reasoning(text: impl Into<String>) -> Self {
        Self::Reasoning(text.into())
    }

    pub fn answer(text: impl Into<String>) -> Self {
        Self::Answer(text.into())
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every record was processed, checkpointed or skipped
    Completed,
    /// A fatal error stopped the batch at `record_id`
    Aborted { record_id: RecordId, error: String },
}

/// Summary of a batch run, returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Records offered by the source
    pub total: usize,
    /// Records found in the checkpoint set
    pub already_done: usize,
    /// Repeated dataset ids whose first occurrence was handled this run
    pub duplicates: usize,
    /// Results appended during this run
    pub processed: usize,
    /// Records skipped after a skippable failure
    pub skipped: usize,
    /// Results whose answer came back empty (persisted or skipped per config)
    pub empty_answers: usize,
    pub runtime_secs: f64,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn new(total: usize) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            total,
            already_done: 0,
            duplicates: 0,
            processed: 0,
            skipped: 0,
            empty_answers: 0,
            runtime_secs: 0.0,
            outcome: RunOutcome::Completed,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self.outcome, RunOutcome::Aborted { .. })
    }

    /// Records neither done before nor during this run.
    pub fn remaining(&self) -> usize {
        self.total
            .saturating_sub(self.already_done + self.duplicates + self.processed)
    }

    pub(crate) fn finish(&mut self, runtime_secs: f64) {
        self.finished_at = Utc::now();
        self.runtime_secs = runtime_secs;
    }
}
