//! Stream relay
//!
//! Opens one upstream completion per call and forwards its chunks, unchanged
//! and in order, through a bounded channel. The upstream connection is opened
//! and its status checked before a [`RelayStream`] is handed out, so callers
//! never see a body that starts and then silently ends on a connect failure.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use uuid::Uuid;

use crate::error::{RelayError, Result};
use crate::upstream::types::CompletionRequest;
use crate::upstream::{ChunkStream, UpstreamSource};

/// Forwards upstream completion streams to callers. Holds no per-request state.
#[derive(Clone)]
pub struct Relay {
    source: Arc<dyn UpstreamSource>,
    channel_capacity: usize,
}

impl Relay {
    pub fn new(source: Arc<dyn UpstreamSource>, channel_capacity: usize) -> Self {
        Self {
            source,
            channel_capacity: channel_capacity.max(1),
        }
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Open the upstream stream and start forwarding it.
    pub async fn open(&self, request: &CompletionRequest) -> Result<RelayStream> {
        let id = Uuid::new_v4();
        tracing::info!(
            request_id = %id,
            mode = %request.mode,
            source = self.source.name(),
            "Opening relay"
        );

        let upstream = match self.source.open(request).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(request_id = %id, error = %e, "Upstream refused relay");
                return Err(e);
            }
        };

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let cancel = CancellationToken::new();
        tokio::spawn(forward(id, upstream, tx, cancel.clone()));

        Ok(RelayStream {
            id,
            inner: ReceiverStream::new(rx),
            cancel: cancel.clone(),
            _guard: cancel.drop_guard(),
        })
    }
}

/// The caller's side of one relay. Dropping it closes the upstream connection.
pub struct RelayStream {
    id: Uuid,
    inner: ReceiverStream<Result<Bytes>>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl RelayStream {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Stop forwarding and close the upstream connection.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Stream for RelayStream {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.poll_next_unpin(cx)
    }
}

async fn forward(
    id: Uuid,
    mut upstream: ChunkStream,
    tx: mpsc::Sender<Result<Bytes>>,
    cancel: CancellationToken,
) {
    let mut chunks = 0usize;
    let mut bytes = 0usize;

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(request_id = %id, chunks, "Relay cancelled");
                break;
            }
            _ = tx.closed() => {
                tracing::debug!(request_id = %id, chunks, "Caller went away");
                break;
            }
            next = upstream.next() => next,
        };

        match next {
            Some(Ok(chunk)) => {
                if chunk.is_empty() {
                    continue;
                }
                chunks += 1;
                bytes += chunk.len();
                // Waits here while the caller is slow; the channel is bounded.
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    sent = tx.send(Ok(chunk)) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
            Some(Err(e)) => {
                tracing::warn!(
                    request_id = %id,
                    chunks,
                    bytes,
                    error = %e,
                    "Upstream stream broke"
                );
                let err = match e {
                    RelayError::StreamAborted(_) => e,
                    other => RelayError::StreamAborted(other.to_string()),
                };
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tx.send(Err(err)) => {}
                }
                break;
            }
            None => {
                tracing::info!(request_id = %id, chunks, bytes, "Relay completed");
                break;
            }
        }
    }
    // `upstream` is dropped here, closing the provider connection.
}
