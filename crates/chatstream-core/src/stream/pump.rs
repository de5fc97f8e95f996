//! Pull-based forwarding loop between a chunk reader and the frame parser.
//!
//! Exactly one read is outstanding at any time. The cancellation token is
//! checked before every read and raced against the pending one.

use bytes::Bytes;
use futures::Stream;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, StreamError};
use crate::transport::ChunkReader;

pub struct StreamPump {
    reader: Box<dyn ChunkReader>,
    cancel: CancellationToken,
    reads_issued: usize,
    finished: bool,
}

impl StreamPump {
    pub fn new(reader: Box<dyn ChunkReader>, cancel: CancellationToken) -> Self {
        Self {
            reader,
            cancel,
            reads_issued: 0,
            finished: false,
        }
    }

    /// Number of reads requested from the underlying reader so far.
    pub fn reads_issued(&self) -> usize {
        self.reads_issued
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Request the next chunk. `Ok(None)` once the reader reports end-of-stream.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.finished {
            return Ok(None);
        }
        if self.cancel.is_cancelled() {
            self.finished = true;
            return Err(StreamError::Cancelled);
        }

        self.reads_issued += 1;
        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StreamError::Cancelled),
            chunk = self.reader.read() => chunk,
        };

        match outcome {
            Ok(Some(chunk)) => {
                tracing::trace!(bytes = chunk.len(), read = self.reads_issued, "Chunk received");
                Ok(Some(chunk))
            }
            Ok(None) => {
                tracing::debug!(reads = self.reads_issued, "Reader reported end of stream");
                self.finished = true;
                Ok(None)
            }
            Err(e) => {
                self.finished = true;
                Err(e)
            }
        }
    }

    /// Expose the forwarding loop as a stream of chunks in arrival order.
    pub fn into_stream(mut self) -> impl Stream<Item = Result<Bytes>> + Send {
        async_stream::try_stream! {
            while let Some(chunk) = self.next_chunk().await? {
                yield chunk;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reader that serves scripted chunks, then hangs forever.
    struct ScriptedReader {
        chunks: VecDeque<Result<Option<Bytes>>>,
        reads: Arc<AtomicUsize>,
    }

    impl ScriptedReader {
        fn new(chunks: Vec<Result<Option<Bytes>>>, reads: Arc<AtomicUsize>) -> Box<Self> {
            Box::new(Self {
                chunks: chunks.into(),
                reads,
            })
        }
    }

    #[async_trait]
    impl ChunkReader for ScriptedReader {
        async fn read(&mut self) -> Result<Option<Bytes>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            match self.chunks.pop_front() {
                Some(next) => next,
                None => futures::future::pending().await,
            }
        }
    }

    #[tokio::test]
    async fn test_forwards_chunks_in_order_then_stops() {
        let reads = Arc::new(AtomicUsize::new(0));
        let reader = ScriptedReader::new(
            vec![
                Ok(Some(Bytes::from_static(b"one"))),
                Ok(Some(Bytes::from_static(b"two"))),
                Ok(None),
            ],
            reads.clone(),
        );
        let mut pump = StreamPump::new(reader, CancellationToken::new());

        assert_eq!(pump.next_chunk().await.unwrap().unwrap(), "one");
        assert_eq!(pump.next_chunk().await.unwrap().unwrap(), "two");
        assert!(pump.next_chunk().await.unwrap().is_none());
        assert!(pump.next_chunk().await.unwrap().is_none());
        assert_eq!(reads.load(Ordering::SeqCst), 3);
        assert_eq!(pump.reads_issued(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_before_read_issues_nothing() {
        let reads = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut pump = StreamPump::new(ScriptedReader::new(vec![], reads.clone()), cancel);

        assert!(pump.next_chunk().await.unwrap_err().is_cancelled());
        assert_eq!(reads.load(Ordering::SeqCst), 0);
        assert!(pump.is_finished());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_pending_read() {
        let reads = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let mut pump = StreamPump::new(
            ScriptedReader::new(vec![Ok(Some(Bytes::from_static(b"first")))], reads.clone()),
            cancel.clone(),
        );

        assert!(pump.next_chunk().await.unwrap().is_some());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            trigger.cancel();
        });

        assert!(pump.next_chunk().await.unwrap_err().is_cancelled());
        assert_eq!(reads.load(Ordering::SeqCst), 2);

        // No further reads once cancellation was observed
        assert!(pump.next_chunk().await.unwrap().is_none());
        assert_eq!(reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_reader_error_ends_pump() {
        let reads = Arc::new(AtomicUsize::new(0));
        let reader = ScriptedReader::new(
            vec![Err(TransportError::Read("connection reset".to_string()).into())],
            reads.clone(),
        );
        let mut pump = StreamPump::new(reader, CancellationToken::new());

        let err = pump.next_chunk().await.unwrap_err();
        assert!(matches!(err, StreamError::Transport(TransportError::Read(_))));
        assert!(pump.next_chunk().await.unwrap().is_none());
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_into_stream_yields_all_chunks() {
        let reads = Arc::new(AtomicUsize::new(0));
        let reader = ScriptedReader::new(
            vec![
                Ok(Some(Bytes::from_static(b"a"))),
                Ok(Some(Bytes::from_static(b"b"))),
                Ok(None),
            ],
            reads,
        );
        let stream = StreamPump::new(reader, CancellationToken::new()).into_stream();
        let chunks: Vec<Bytes> = stream.map(|chunk| chunk.unwrap()).collect().await;
        assert_eq!(chunks, vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]);
    }
}
