//! Record source: the input dataset, loaded wholesale before a run.

use crate::models::{DatasetConfig, Record, RecordId, Result, SolaceError};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};

/// Ordered, immutable sequence of records for one run.
#[derive(Debug, Clone, Default)]
pub struct RecordSource {
    records: Vec<Record>,
}

impl RecordSource {
    pub fn new(records: Vec<Record>) -> Self {
        let source = Self { records };
        source.warn_duplicates();
        source
    }

    /// Load a JSON array of records.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| SolaceError::io("opening dataset", e))?;
        let records: Vec<Record> =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| SolaceError::Dataset {
                path: path.to_owned(),
                source: e,
            })?;

        info!(path = %path.display(), count = records.len(), "Loaded dataset");
        Ok(Self::new(records))
    }

    /// Load the `[dataset]` input, restricted to its configured range.
    pub fn from_config(dataset: &DatasetConfig) -> Result<Self> {
        Self::load(&dataset.input)?.with_range(dataset.start, dataset.end)
    }

    /// Narrow to the index window `[start, end)`, keeping order.
    ///
    /// Bounds past the end of the dataset are clamped.
    pub fn with_range(mut self, start: Option<usize>, end: Option<usize>) -> Result<Self> {
        let len = self.records.len();
        let start = start.unwrap_or(0).min(len);
        let end = end.unwrap_or(len).min(len);
        if start > end {
            return Err(SolaceError::InvalidInput(format!(
                "record range {start}..{end} is empty or reversed"
            )));
        }
        if start > 0 || end < len {
            info!(start, end, of = len, "Restricting dataset to index range");
        }
        self.records.truncate(end);
        self.records.drain(..start);
        Ok(self)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn warn_duplicates(&self) {
        let mut seen: HashSet<&RecordId> = HashSet::with_capacity(self.records.len());
        let duplicates = self.records.iter().filter(|r| !seen.insert(&r.id)).count();
        if duplicates > 0 {
            warn!(duplicates, "Dataset contains repeated ids; only the first occurrence is processed");
        }
    }
}
