//! OpenAI-compatible chat completions source.
//!
//! Sends one streaming request and turns the SSE response into plain text
//! chunks, one per `choices[0].delta.content`.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::config::{SecretString, UpstreamConfig};
use crate::error::{RelayError, Result};

use super::sse::{SseDecoder, SseFrame};
use super::types::{ChatPayload, CompletionRequest, StreamChunk};
use super::{ChunkStream, UpstreamSource};

/// Streaming client for an OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct OpenAiSource {
    api_key: SecretString,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiSource {
    pub fn new(api_key: SecretString, model: impl Into<String>) -> Self {
        Self {
            api_key,
            model: model.into(),
            base_url: "https://api.openai.com".to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> Self {
        self.base_url = normalize_base_url(base_url.as_ref());
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Build a source from configuration. Fails if no API key can be found.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self> {
        let api_key = config.resolve_api_key()?;
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self::new(api_key, config.model.clone())
            .with_base_url(&config.base_url)
            .with_client(client))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }
}

#[async_trait]
impl UpstreamSource for OpenAiSource {
    fn name(&self) -> &str {
        "openai"
    }

    async fn open(&self, request: &CompletionRequest) -> Result<ChunkStream> {
        let url = self.endpoint();
        let payload = ChatPayload::new(&self.model, request);
        tracing::debug!(
            url = %url,
            model = %self.model,
            mode = %request.mode,
            "Opening upstream stream"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose())
            .json(&payload)
            .send()
            .await
            .map_err(RelayError::UpstreamConnect)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(delta_stream(response.bytes_stream()))
    }
}

/// Normalize base URL by stripping trailing /v1
fn normalize_base_url(base_url: &str) -> String {
    base_url
        .trim_end_matches('/')
        .trim_end_matches("/v1")
        .trim_end_matches('/')
        .to_string()
}

/// What one SSE frame contributes to the text stream.
#[derive(Debug, PartialEq)]
enum FrameOutcome {
    Text(String),
    Finished,
    Done,
    Failed(String),
    Skip,
}

fn interpret_frame(frame: &SseFrame) -> FrameOutcome {
    if frame.is_done() {
        return FrameOutcome::Done;
    }

    let chunk: StreamChunk = match serde_json::from_str(&frame.data) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::warn!(error = %e, "Skipping unparseable upstream frame");
            return FrameOutcome::Skip;
        }
    };

    if let Some(error) = chunk.error {
        return FrameOutcome::Failed(error.message);
    }

    let Some(choice) = chunk.choices.into_iter().next() else {
        return FrameOutcome::Skip;
    };
    match choice.delta.and_then(|d| d.content) {
        Some(content) if !content.is_empty() => FrameOutcome::Text(content),
        _ if choice.finish_reason.is_some() => FrameOutcome::Finished,
        _ => FrameOutcome::Skip,
    }
}

struct DeltaState<S> {
    body: Pin<Box<S>>,
    decoder: SseDecoder,
    /// A choice reported its finish reason
    finished: bool,
    done: bool,
}

/// Map a raw SSE byte stream to content deltas.
///
/// Ends cleanly at `[DONE]`. A transport error, an error frame, or a close
/// before any finish reason ends the stream with [`RelayError::StreamAborted`].
fn delta_stream<S, E>(body: S) -> ChunkStream
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = DeltaState {
        body: Box::pin(body),
        decoder: SseDecoder::new(),
        finished: false,
        done: false,
    };

    let stream = futures::stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }

        loop {
            while let Some(frame) = state.decoder.next_frame() {
                match interpret_frame(&frame) {
                    FrameOutcome::Text(text) => return Some((Ok(Bytes::from(text)), state)),
                    FrameOutcome::Finished => state.finished = true,
                    FrameOutcome::Done => return None,
                    FrameOutcome::Failed(message) => {
                        state.done = true;
                        return Some((Err(RelayError::StreamAborted(message)), state));
                    }
                    FrameOutcome::Skip => {}
                }
            }

            match state.body.next().await {
                Some(Ok(bytes)) => state.decoder.push(&bytes),
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(RelayError::StreamAborted(e.to_string())), state));
                }
                None => {
                    state.done = true;
                    if let Some(frame) = state.decoder.finish() {
                        match interpret_frame(&frame) {
                            FrameOutcome::Text(text) => {
                                return Some((Ok(Bytes::from(text)), state));
                            }
                            FrameOutcome::Finished | FrameOutcome::Done => return None,
                            FrameOutcome::Failed(message) => {
                                return Some((Err(RelayError::StreamAborted(message)), state));
                            }
                            FrameOutcome::Skip => {}
                        }
                    }
                    if state.finished {
                        return None;
                    }
                    return Some((
                        Err(RelayError::StreamAborted(
                            "upstream closed the connection before the completion finished"
                                .to_string(),
                        )),
                        state,
                    ));
                }
            }
        }
    });

    Box::pin(stream)
}
