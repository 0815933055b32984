pub mod openai;
pub mod sse;
pub mod types;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::error::Result;

use types::CompletionRequest;

/// Ordered stream of text chunks. An `Err` item ends the stream.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// A provider that turns a prompt into a stream of completion text.
#[async_trait]
pub trait UpstreamSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Open one streaming completion.
    ///
    /// Connection and status failures are returned here, before any chunk is
    /// produced. Failures after that arrive as an `Err` item on the stream.
    async fn open(&self, request: &CompletionRequest) -> Result<ChunkStream>;
}
