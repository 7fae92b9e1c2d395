//! Streaming client for OpenAI-compatible chat completion endpoints.
//!
//! - One `POST {base_url}/chat/completions` per record with `stream: true`
//! - Non-success statuses become structured [`ApiError`]s
//! - Transport timeouts surface as [`SolaceError::Timeout`]
//! - No retries: a failed call is reported to the batch driver as is

use crate::client::{CompletionClient, CompletionRequest, FragmentStream, Message, SseDecoder, api_error_from_body};
use crate::models::{ApiError, EndpointConfig, Result, SolaceError, StreamFragment};
use futures::{Stream, StreamExt, stream};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::debug;

/// Chat completion request payload.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f64,
    top_p: f64,
    stream: bool,
}

impl<'a> ChatCompletionRequest<'a> {
    fn streaming(request: &'a CompletionRequest) -> Self {
        Self {
            model: &request.model,
            messages: &request.messages,
            max_tokens: request.sampling.max_tokens,
            temperature: request.sampling.temperature,
            top_p: request.sampling.top_p,
            stream: true,
        }
    }
}

/// Streaming LLM client.
pub struct LlmClient {
    client: reqwest::Client,
    /// API key (None for local endpoints without auth)
    api_key: Option<String>,
    /// Base URL for the API
    base_url: String,
    /// Whole-request timeout
    timeout: Duration,
}

impl LlmClient {
    /// Create a new client.
    pub fn new(
        api_key: Option<String>,
        base_url: impl Into<String>,
        timeout_secs: u64,
        connect_timeout_secs: u64,
    ) -> Result<Self> {
        let timeout = Duration::from_secs(timeout_secs);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .build()
            .map_err(SolaceError::Network)?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Create a client from the `[endpoint]` section and a resolved key.
    pub fn from_config(config: &EndpointConfig, api_key: Option<String>) -> Result<Self> {
        Self::new(
            api_key,
            config.base_url.clone(),
            config.timeout_secs,
            config.connect_timeout_secs,
        )
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build headers for a request.
    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        if let Some(ref api_key) = self.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|_| SolaceError::InvalidInput("API key is not a valid header value".to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        Ok(headers)
    }

    /// Open a streaming completion.
    ///
    /// Returns once the response headers are in; fragments are read lazily.
    pub async fn open_stream(&self, request: CompletionRequest) -> Result<FragmentStream> {
        let start = Instant::now();
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatCompletionRequest::streaming(&request);

        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let error = api_error_from_body(status.as_u16(), &error_body);
            debug!(status = status.as_u16(), code = ?error.code, "Completion request rejected");
            return Err(SolaceError::Api(error));
        }

        debug!(
            model = %request.model,
            latency_ms = start.elapsed().as_millis() as u64,
            "Completion stream opened"
        );

        let state = StreamState::new(response.bytes_stream().boxed(), self.timeout);
        Ok(stream::try_unfold(state, StreamState::advance).boxed())
    }

    /// Probe `{base_url}/models` and look for `model` in the listing.
    ///
    /// Never fails: every problem is folded into the returned result so
    /// `validate` can report it next to the rest of the configuration.
    pub async fn health_check(&self, model: &str) -> HealthCheckResult {
        let start = Instant::now();
        let url = format!("{}/models", self.base_url);

        let headers = match self.headers() {
            Ok(headers) => headers,
            Err(e) => return HealthCheckResult::failed(HealthStatus::Unhealthy, None, e.to_string()),
        };

        let response = match self
            .client
            .get(&url)
            .headers(headers)
            .timeout(HEALTH_CHECK_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return HealthCheckResult::failed(HealthStatus::Unreachable, None, e.to_string()),
        };

        let latency_ms = start.elapsed().as_millis() as u64;
        let status = response.status();
        if !status.is_success() {
            return HealthCheckResult::failed(
                HealthStatus::Unhealthy,
                Some(latency_ms),
                format!("HTTP {}", status.as_u16()),
            );
        }

        // Some compatible endpoints answer /models without a usable listing.
        let model_listed = response
            .json::<ModelList>()
            .await
            .ok()
            .map(|list| list.data.iter().any(|entry| entry.id == model));
        debug!(model, ?model_listed, latency_ms, "Health check finished");

        HealthCheckResult {
            status: HealthStatus::Healthy,
            latency_ms: Some(latency_ms),
            model_listed,
            error: None,
        }
    }
}

impl CompletionClient for LlmClient {
    fn stream_completion(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<FragmentStream>> + Send {
        self.open_stream(request)
    }
}

fn transport_error(error: reqwest::Error, timeout: Duration) -> SolaceError {
    if error.is_timeout() {
        SolaceError::Timeout(timeout)
    } else if let Some(status) = error.status() {
        SolaceError::Api(ApiError::new(status.as_u16(), error.to_string()))
    } else {
        SolaceError::Network(error)
    }
}

/// Unfold state turning a byte stream into fragments.
struct StreamState<S> {
    bytes: S,
    decoder: SseDecoder,
    pending: VecDeque<StreamFragment>,
    exhausted: bool,
    timeout: Duration,
}

impl<S, B> StreamState<S>
where
    S: Stream<Item = reqwest::Result<B>> + Unpin,
    B: AsRef<[u8]>,
{
    fn new(bytes: S, timeout: Duration) -> Self {
        Self {
            bytes,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            exhausted: false,
            timeout,
        }
    }

    async fn advance(mut self) -> Result<Option<(StreamFragment, Self)>> {
        loop {
            if let Some(fragment) = self.pending.pop_front() {
                return Ok(Some((fragment, self)));
            }
            if self.exhausted || self.decoder.is_done() {
                return Ok(None);
            }
            match self.bytes.next().await {
                Some(Ok(chunk)) => {
                    let fragments = self.decoder.feed(chunk.as_ref())?;
                    self.pending.extend(fragments);
                }
                Some(Err(e)) => return Err(transport_error(e, self.timeout)),
                None => {
                    let fragments = self.decoder.finish()?;
                    self.pending.extend(fragments);
                    self.exhausted = true;
                }
            }
        }
    }
}

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// Outcome of [`LlmClient::health_check`].
#[derive(Debug, Clone)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    /// Round trip of the /models call, when a response came back
    pub latency_ms: Option<u64>,
    /// Whether the configured model appears in the listing; `None` when the
    /// endpoint returned no parseable listing
    pub model_listed: Option<bool>,
    pub error: Option<String>,
}

impl HealthCheckResult {
    fn failed(status: HealthStatus, latency_ms: Option<u64>, error: String) -> Self {
        Self {
            status,
            latency_ms,
            model_listed: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// /models answered with a success status
    Healthy,
    /// Endpoint answered with an error status
    Unhealthy,
    /// No response at all
    Unreachable,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Unreachable => "unreachable",
        })
    }
}
