//! Shared fixtures for batch driver tests.

#![allow(dead_code)]

use futures::{StreamExt, stream};
use solace::models::SamplingConfig;
use solace::{
    ApiError, BatchDriver, CheckpointStore, CompletionClient, CompletionRequest, FragmentStream,
    ProcessedResult, PromptBuilder, Record, RecordId, RecordSource, Result, SolaceError,
    StreamFragment,
};
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Scripted behaviour for one record.
#[derive(Debug, Clone)]
pub enum Reply {
    Fragments(Vec<StreamFragment>),
    /// HTTP 400 on open
    Reject,
    /// Content-policy error object after some fragments
    RejectMidStream(Vec<StreamFragment>),
    /// Request timeout on open
    Timeout,
    /// Malformed chunk after some fragments
    BreakMidStream(Vec<StreamFragment>),
}

/// In-memory completion client keyed by prompt text.
///
/// Prompts are the bare record title (see [`driver`]); unscripted titles get
/// a reasoning fragment followed by `"answer to <title>"`.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    replies: HashMap<String, Reply>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, id: i64, reply: Reply) -> Self {
        self.replies.insert(title(id), reply);
        self
    }

    /// Prompts seen, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CompletionClient for ScriptedClient {
    fn stream_completion(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<FragmentStream>> + Send {
        let prompt = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.calls.lock().unwrap().push(prompt.clone());

        let reply = self.replies.get(&prompt).cloned().unwrap_or_else(|| {
            Reply::Fragments(vec![
                StreamFragment::reasoning("let me think"),
                StreamFragment::answer(format!("answer to {prompt}")),
            ])
        });

        async move {
            let items: Vec<Result<StreamFragment>> = match reply {
                Reply::Fragments(fragments) => fragments.into_iter().map(Ok).collect(),
                Reply::Reject => {
                    return Err(SolaceError::Api(ApiError::new(
                        400,
                        "Output data may contain inappropriate content.",
                    )));
                }
                Reply::Timeout => return Err(SolaceError::Timeout(Duration::from_secs(180))),
                Reply::RejectMidStream(fragments) => fragments
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(SolaceError::Api(
                        ApiError::new(200, "inspection failed").with_code("data_inspection_failed"),
                    ))))
                    .collect(),
                Reply::BreakMidStream(fragments) => fragments
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(SolaceError::MalformedStream(
                        "unexpected end of chunk".to_string(),
                    ))))
                    .collect(),
            };
            Ok(stream::iter(items).boxed())
        }
    }
}

pub fn title(id: i64) -> String {
    format!("title-{id}")
}

pub fn records(ids: &[i64]) -> RecordSource {
    RecordSource::new(
        ids.iter()
            .map(|&id| Record::new(id, title(id), format!("description {id}")))
            .collect(),
    )
}

/// Driver whose prompt is exactly the record title.
pub fn driver(client: ScriptedClient, output: &Path) -> BatchDriver<ScriptedClient> {
    BatchDriver::new(
        client,
        CheckpointStore::new(output),
        PromptBuilder::new("", "{title}"),
        "test-model",
        SamplingConfig::default(),
    )
}

pub fn read_log(path: &Path) -> Vec<ProcessedResult> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

pub fn logged_ids(path: &Path) -> Vec<RecordId> {
    read_log(path).into_iter().map(|r| r.id).collect()
}

pub fn ids(ids: &[i64]) -> Vec<RecordId> {
    ids.iter().map(|&id| RecordId::Int(id)).collect()
}

/// Pre-populate a log as a previous run would have.
pub fn seed_log(path: &Path, ids: &[i64]) {
    let store = CheckpointStore::new(path);
    for &id in ids {
        store
            .append(&ProcessedResult {
                id: RecordId::Int(id),
                title: title(id),
                description: format!("description {id}"),
                answer: format!("answer to {}", title(id)),
            })
            .unwrap();
    }
}
