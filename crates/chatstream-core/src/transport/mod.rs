//! Transport seam: opening a request and reading its body chunk by chunk

mod channel;
mod http;

pub use channel::{ChannelTransport, ChunkSender};
pub use http::{HttpTransport, ResponseReader};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::request::ChatRequest;

/// Pull-based reader over a response body.
#[async_trait]
pub trait ChunkReader: Send {
    /// Next chunk in arrival order, `None` at end-of-stream.
    async fn read(&mut self) -> Result<Option<Bytes>>;
}

/// Sends a request and hands back its body reader.
///
/// Non-success responses and missing bodies fail here, before any chunk is read.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn open(&self, request: &ChatRequest) -> Result<Box<dyn ChunkReader>>;
}
