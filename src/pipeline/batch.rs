//! Batch driver: resumable, sequential generation over a record source.
//!
//! Pipeline flow:
//! Records → (skip if checkpointed) → streaming completion → accumulator →
//! append to output log
//!
//! - One record is fully processed and persisted before the next starts
//! - The checkpoint set is read once, before the first write
//! - Record failures never escape: content-policy rejections skip the
//!   record, anything else stops the batch with a fatal outcome

use crate::checkpoint::CheckpointStore;
use crate::client::CompletionClient;
use crate::models::{
    Config, Disposition, ProcessedResult, Record, RecordId, Result, RunOutcome, RunReport,
    SamplingConfig,
};
use crate::pipeline::{PromptBuilder, RecordSource, ResponseAccumulator};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// What happened to a record that did not fail.
enum RecordOutcome {
    Persisted { empty: bool },
    EmptySkipped,
}

/// Sequential batch driver over one completion client.
pub struct BatchDriver<C> {
    client: C,
    store: CheckpointStore,
    prompts: PromptBuilder,
    model: String,
    sampling: SamplingConfig,
    skip_empty_answers: bool,
    show_progress: bool,
}

impl<C: CompletionClient> BatchDriver<C> {
    pub fn new(
        client: C,
        store: CheckpointStore,
        prompts: PromptBuilder,
        model: impl Into<String>,
        sampling: SamplingConfig,
    ) -> Self {
        Self {
            client,
            store,
            prompts,
            model: model.into(),
            sampling,
            skip_empty_answers: false,
            show_progress: false,
        }
    }

    /// Create a driver from configuration.
    pub fn from_config(client: C, config: &Config) -> Result<Self> {
        let prompts = PromptBuilder::from_config(&config.persona)?;
        let driver = Self::new(
            client,
            CheckpointStore::new(&config.dataset.output),
            prompts,
            config.model.id.clone(),
            config.model.sampling,
        )
        .skip_empty_answers(config.dataset.skip_empty_answers);
        Ok(driver)
    }

    /// Leave records whose answer came back empty unpersisted.
    pub fn skip_empty_answers(mut self, skip: bool) -> Self {
        self.skip_empty_answers = skip;
        self
    }

    /// Draw a progress bar on stderr.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Run the batch over `source`.
    ///
    /// Errors only when the checkpoint set cannot be built, before any record
    /// is touched. A fatal record error is reported through
    /// [`RunReport::outcome`].
    pub async fn run(&self, source: &RecordSource) -> Result<RunReport> {
        let start = Instant::now();
        let checkpoint = self.store.load()?;
        let mut report = RunReport::new(source.len());

        info!(
            run_id = %report.run_id,
            total = source.len(),
            checkpointed = checkpoint.len(),
            model = %self.model,
            output = %self.store.path().display(),
            "Starting batch run"
        );

        let pb = self.progress_bar(source.len());
        // Ids persisted during this run; guards against repeated ids in the dataset.
        let mut persisted: HashSet<RecordId> = HashSet::new();

        for record in source.records() {
            if checkpoint.contains(&record.id) {
                info!(record_id = %record.id, "Skipping already processed record");
                report.already_done += 1;
                pb.inc(1);
                continue;
            }
            if persisted.contains(&record.id) {
                warn!(record_id = %record.id, "Skipping repeated dataset id");
                report.duplicates += 1;
                pb.inc(1);
                continue;
            }

            match self.process(record).await {
                Ok(RecordOutcome::Persisted { empty }) => {
                    report.processed += 1;
                    if empty {
                        report.empty_answers += 1;
                    }
                    persisted.insert(record.id.clone());
                    info!(record_id = %record.id, "Processed and saved");
                }
                Ok(RecordOutcome::EmptySkipped) => {
                    report.empty_answers += 1;
                    report.skipped += 1;
                }
                Err(e) => match e.disposition() {
                    Disposition::Skip => {
                        warn!(record_id = %record.id, error = %e, "Request rejected, skipping record");
                        report.skipped += 1;
                    }
                    Disposition::Abort => {
                        error!(record_id = %record.id, error = %e, "Fatal error, stopping batch");
                        report.outcome = RunOutcome::Aborted {
                            record_id: record.id.clone(),
                            error: e.to_string(),
                        };
                        break;
                    }
                },
            }

            pb.inc(1);
            pb.set_message(format!(
                "saved: {}, skipped: {}",
                report.processed, report.skipped
            ));
        }

        report.finish(start.elapsed().as_secs_f64());
        match &report.outcome {
            RunOutcome::Completed => pb.finish_with_message(format!(
                "Done! {} saved, {} skipped",
                report.processed, report.skipped
            )),
            RunOutcome::Aborted { record_id, .. } => {
                pb.abandon_with_message(format!("Stopped at record {record_id}"))
            }
        }

        info!(
            run_id = %report.run_id,
            processed = report.processed,
            already_done = report.already_done,
            duplicates = report.duplicates,
            skipped = report.skipped,
            empty_answers = report.empty_answers,
            remaining = report.remaining(),
            fatal = report.is_fatal(),
            runtime = format!("{:.1}s", report.runtime_secs),
            "Batch run finished"
        );

        Ok(report)
    }

    /// Generate, accumulate and persist one record.
    async fn process(&self, record: &Record) -> Result<RecordOutcome> {
        let request = self.prompts.build(record, &self.model, self.sampling);

        let stream = self.client.stream_completion(request).await?;
        let answer = ResponseAccumulator::drain(stream).await?;
        debug!(record_id = %record.id, chars = answer.chars().count(), "Answer accumulated");

        let empty = answer.trim().is_empty();
        if empty {
            warn!(record_id = %record.id, "Completion produced an empty answer");
            if self.skip_empty_answers {
                return Ok(RecordOutcome::EmptySkipped);
            }
        }

        let result = ProcessedResult {
            id: record.id.clone(),
            title: self.prompts.augmented_title(record),
            description: record.description.clone(),
            answer,
        };
        self.store.append(&result)?;
        Ok(RecordOutcome::Persisted { empty })
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}")
        {
            pb.set_style(style.progress_chars("##-"));
        }
        pb
    }
}
