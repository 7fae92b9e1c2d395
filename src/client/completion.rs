//! Request/response contract between the batch driver and a completion
//! endpoint.

use crate::models::{Result, SamplingConfig, StreamFragment};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Message in a chat completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// One streaming completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Model identifier
    pub model: String,
    /// Role-tagged messages, in order
    pub messages: Vec<Message>,
    pub sampling: SamplingConfig,
}

/// Fragments of one response, in arrival order, ending at stream close.
pub type FragmentStream = BoxStream<'static, Result<StreamFragment>>;

/// A streaming completion endpoint.
///
/// Failures, whether raised when opening the call or from inside the stream,
/// are returned as classifiable [`crate::SolaceError`] values.
pub trait CompletionClient {
    fn stream_completion(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<FragmentStream>> + Send;
}
