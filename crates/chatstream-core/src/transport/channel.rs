//! In-process transport fed by the host.
//!
//! Hosts that own their networking stack (or tests) push body chunks through a
//! [`ChunkSender`]; each `open` consumes the next prepared response.

use std::collections::VecDeque;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use super::{ChatTransport, ChunkReader};
use crate::error::{Result, TransportError};
use crate::request::ChatRequest;

const DEFAULT_CAPACITY: usize = 16;

type HeadResult = std::result::Result<(), TransportError>;

struct Prepared {
    head: oneshot::Receiver<HeadResult>,
    chunks: mpsc::Receiver<std::result::Result<Bytes, TransportError>>,
}

pub struct ChannelTransport {
    prepared: Mutex<VecDeque<Prepared>>,
    requests: Mutex<Vec<ChatRequest>>,
    capacity: usize,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// `capacity` bounds how many chunks may wait unread.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            prepared: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    /// Queue a successful response whose body is fed through the returned sender.
    pub fn prepare(&self) -> ChunkSender {
        let mut sender = self.prepare_deferred();
        sender.accept();
        sender
    }

    /// Queue a response whose status is decided later with
    /// [`ChunkSender::accept`] or [`ChunkSender::reject`]. Until then `open` waits.
    pub fn prepare_deferred(&self) -> ChunkSender {
        let (head_tx, head_rx) = oneshot::channel();
        let (chunk_tx, chunk_rx) = mpsc::channel(self.capacity);
        self.prepared.lock().push_back(Prepared {
            head: head_rx,
            chunks: chunk_rx,
        });
        ChunkSender {
            head: Some(head_tx),
            chunks: chunk_tx,
        }
    }

    /// Every request passed to `open`, oldest first.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }
}

impl Default for ChannelTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTransport for ChannelTransport {
    async fn open(&self, request: &ChatRequest) -> Result<Box<dyn ChunkReader>> {
        self.requests.lock().push(request.clone());
        let next = self.prepared.lock().pop_front();
        let Some(prepared) = next else {
            return Err(TransportError::MissingBody.into());
        };

        match prepared.head.await {
            Ok(Ok(())) => Ok(Box::new(ChannelReader {
                chunks: prepared.chunks,
            })),
            Ok(Err(e)) => Err(e.into()),
            // Sender dropped before deciding
            Err(_) => Err(TransportError::MissingBody.into()),
        }
    }
}

/// Producer side of one prepared response.
pub struct ChunkSender {
    head: Option<oneshot::Sender<HeadResult>>,
    chunks: mpsc::Sender<std::result::Result<Bytes, TransportError>>,
}

impl ChunkSender {
    pub fn accept(&mut self) {
        if let Some(head) = self.head.take() {
            let _ = head.send(Ok(()));
        }
    }

    pub fn reject(&mut self, error: TransportError) {
        if let Some(head) = self.head.take() {
            let _ = head.send(Err(error));
        }
    }

    /// Push one body chunk. Returns false once the reader is gone.
    pub async fn send(&self, chunk: impl Into<Bytes>) -> bool {
        self.chunks.send(Ok(chunk.into())).await.is_ok()
    }

    pub async fn send_text(&self, text: &str) -> bool {
        self.send(Bytes::copy_from_slice(text.as_bytes())).await
    }

    /// Fail the body mid-stream.
    pub async fn fail(&self, error: TransportError) -> bool {
        self.chunks.send(Err(error)).await.is_ok()
    }

    /// True once the reading side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.chunks.is_closed()
    }

    /// End the body. Dropping the sender has the same effect.
    pub fn close(self) {}
}

struct ChannelReader {
    chunks: mpsc::Receiver<std::result::Result<Bytes, TransportError>>,
}

#[async_trait]
impl ChunkReader for ChannelReader {
    async fn read(&mut self) -> Result<Option<Bytes>> {
        match self.chunks.recv().await {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }
}
