//! Append-only result log and the checkpoint set derived from it.
//!
//! - The log is one JSON object per line, each line independently parseable
//! - The checkpoint set is built once, before any write in the same run
//! - Each append is a single open/write/flush/close, so a crash can lose at
//!   most the in-flight record

use crate::models::{ProcessedResult, RecordId, Result, SolaceError};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Identifiers already present in the output log at run start.
pub type CheckpointSet = HashSet<RecordId>;

/// Reader and appender for the JSONL output log.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the output log.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rebuild the checkpoint set by scanning the whole log.
    ///
    /// A missing log is created empty. Blank lines are ignored; any other
    /// line that does not parse as a result fails the load.
    pub fn load(&self) -> Result<CheckpointSet> {
        if !self.path.exists() {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .map_err(|e| SolaceError::io("creating output directory", e))?;
            }
            File::create(&self.path).map_err(|e| SolaceError::io("creating output log", e))?;
            info!(path = %self.path.display(), "Created empty output log");
            return Ok(CheckpointSet::new());
        }

        let file = File::open(&self.path).map_err(|e| SolaceError::io("opening output log", e))?;
        let reader = BufReader::new(file);
        let mut done = CheckpointSet::new();

        // Raw bytes: a torn multi-byte write must surface as a corrupt line,
        // not as an I/O failure.
        for (line_num, line) in reader.split(b'\n').enumerate() {
            let line = line.map_err(|e| SolaceError::io("reading output log", e))?;
            let line = line.trim_ascii();
            if line.is_empty() {
                continue;
            }
            let result: ProcessedResult =
                serde_json::from_slice(line).map_err(|e| SolaceError::CorruptLog {
                    path: self.path.clone(),
                    line: line_num + 1,
                    source: e,
                })?;
            done.insert(result.id);
        }

        info!(path = %self.path.display(), checkpointed = done.len(), "Loaded checkpoint set");
        Ok(done)
    }

    /// Append one result as a single line.
    pub fn append(&self, result: &ProcessedResult) -> Result<()> {
        let mut line = serde_json::to_string(result)
            .map_err(|e| SolaceError::Internal(format!("Serializing result: {e}")))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SolaceError::io("opening output log", e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| SolaceError::io("writing output log", e))?;
        file.flush()
            .map_err(|e| SolaceError::io("flushing output log", e))?;
        file.sync_data()
            .map_err(|e| SolaceError::io("syncing output log", e))?;

        debug!(record_id = %result.id, "Result appended");
        Ok(())
    }
}
