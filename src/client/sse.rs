//! Server-sent-events decoding for OpenAI-compatible streaming responses.
//!
//! Bytes arrive in arbitrary chunks; the decoder buffers partial lines,
//! assembles `data:` payloads into events, and turns each chat-completion
//! chunk into zero or one [`StreamFragment`].

use crate::models::{ApiError, Result, SolaceError, StreamFragment};
use serde::Deserialize;

const DONE_SENTINEL: &str = "[DONE]";

/// Streaming chunk payload.
#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    /// OpenRouter spelling of `reasoning_content`
    #[serde(default)]
    reasoning: Option<String>,
}

/// API error envelope (OpenAI-compatible).
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
    /// Providers send both string and numeric codes
    #[serde(default)]
    code: Option<serde_json::Value>,
}

impl ApiErrorDetail {
    fn into_api_error(self, status: u16) -> ApiError {
        ApiError {
            status,
            code: self.code.and_then(|c| match c {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            }),
            error_type: self.error_type,
            message: self.message.unwrap_or_default(),
        }
    }
}

/// Build an [`ApiError`] from a non-success response body.
///
/// Bodies that are not an error envelope keep their raw text as message.
pub fn api_error_from_body(status: u16, body: &str) -> ApiError {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(envelope) => envelope.error.into_api_error(status),
        Err(_) => ApiError::new(status, body.trim()),
    }
}

/// Incremental SSE decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Bytes of the current, unterminated line
    line: Vec<u8>,
    /// `data:` lines of the current event
    data: Vec<String>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed raw bytes, returning the fragments completed by them.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<StreamFragment>> {
        let mut fragments = Vec::new();
        for &byte in bytes {
            if self.done {
                break;
            }
            if byte == b'\n' {
                let line = std::mem::take(&mut self.line);
                self.process_line(&line, &mut fragments)?;
            } else {
                self.line.push(byte);
            }
        }
        Ok(fragments)
    }

    /// Flush a trailing line and event at end of stream.
    pub fn finish(&mut self) -> Result<Vec<StreamFragment>> {
        let mut fragments = Vec::new();
        if self.done {
            return Ok(fragments);
        }
        if !self.line.is_empty() {
            let line = std::mem::take(&mut self.line);
            self.process_line(&line, &mut fragments)?;
        }
        self.dispatch(&mut fragments)?;
        Ok(fragments)
    }

    fn process_line(&mut self, raw: &[u8], fragments: &mut Vec<StreamFragment>) -> Result<()> {
        let line = std::str::from_utf8(raw)
            .map_err(|e| SolaceError::MalformedStream(format!("invalid UTF-8: {e}")))?;
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            return self.dispatch(fragments);
        }
        if line.starts_with(':') {
            return Ok(());
        }
        if let Some(value) = line.strip_prefix("data:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            self.data.push(value.to_string());
        }
        // event:, id: and retry: carry nothing we use
        Ok(())
    }

    fn dispatch(&mut self, fragments: &mut Vec<StreamFragment>) -> Result<()> {
        if self.data.is_empty() {
            return Ok(());
        }
        let payload = std::mem::take(&mut self.data).join("\n");
        if payload.trim() == DONE_SENTINEL {
            self.done = true;
            return Ok(());
        }
        if let Some(fragment) = parse_chunk(&payload)? {
            fragments.push(fragment);
        }
        Ok(())
    }
}

/// Turn one chunk payload into a fragment.
///
/// Chunks without choices yield nothing; a delta carrying reasoning yields a
/// reasoning fragment even when it also carries content.
pub fn parse_chunk(payload: &str) -> Result<Option<StreamFragment>> {
    let chunk: ChatCompletionChunk = serde_json::from_str(payload)
        .map_err(|e| SolaceError::MalformedStream(format!("{e}: {payload}")))?;

    if let Some(error) = chunk.error {
        return Err(SolaceError::Api(error.into_api_error(200)));
    }

    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(None);
    };
    let delta = choice.delta;

    if let Some(reasoning) = delta.reasoning_content.or(delta.reasoning) {
        return Ok(Some(StreamFragment::Reasoning(reasoning)));
    }
    Ok(delta.content.map(StreamFragment::Answer))
}
