//! ChatStream Core - client-side engine for streamed chat completions
//!
//! This crate provides:
//! - SSE frame parsing that survives frames split across reads
//! - A single-slot stream pump with cooperative cancellation
//! - Copy-on-write conversation state and delta accumulation
//! - A session controller that allows one in-flight request at a time

pub mod accumulator;
pub mod config;
pub mod conversation;
pub mod error;
mod http_client;
pub mod models;
pub mod request;
pub mod session;
pub mod stream;
pub mod transport;

// Re-export commonly used types
pub use config::{ChatConfig, DEFAULT_ENDPOINT};
pub use conversation::Conversation;
pub use error::{ParseError, Result, StreamError, TransportError};
pub use models::{ChatMessage, Delta, MessageChunk, MessageInput, MessageMeta, RequestMessage};
pub use request::{ApiParams, ChatRequest, build_request_body};
pub use session::{ChatCompletion, ChatSnapshot, SubmitOutcome};
pub use stream::{FrameParser, StreamPump};
pub use transport::{ChannelTransport, ChatTransport, ChunkReader, ChunkSender, HttpTransport};
