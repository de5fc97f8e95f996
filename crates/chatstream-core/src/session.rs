//! Session controller
//!
//! Owns the conversation, allows one in-flight request at a time and drives
//! transport → pump → frame parser → accumulator for that request.
//!
//! State transitions:
//! ```text
//! Idle → Submitting → Streaming → Settled → Idle
//!            └────────────┴─────→ Aborted → Idle
//! ```

use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::accumulator::{apply_to_conversation, finalize};
use crate::config::ChatConfig;
use crate::conversation::Conversation;
use crate::error::{Result, StreamError};
use crate::models::{ChatMessage, Delta, MessageInput, RequestMessage};
use crate::request::ChatRequest;
use crate::stream::{FrameParser, StreamPump};
use crate::transport::{ChatTransport, HttpTransport};

/// How a call to [`ChatCompletion::submit_prompt`] ended.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// A session was already active, the last message was still loading, or
    /// no messages were given. Nothing changed.
    Rejected,
    /// The stream ended and the response was finalized.
    Completed,
    /// The caller aborted the request.
    Aborted,
    /// Transport or parse failure. Content merged so far is kept.
    Failed(StreamError),
}

impl SubmitOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, SubmitOutcome::Completed)
    }
}

/// Immutable view published to observers after every update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatSnapshot {
    pub messages: Conversation,
    pub loading: bool,
}

#[derive(Default)]
struct SessionState {
    conversation: Conversation,
    /// Present only while a request is in flight
    cancel: Option<CancellationToken>,
    loading: bool,
}

struct Inner {
    config: ChatConfig,
    transport: Arc<dyn ChatTransport>,
    state: Mutex<SessionState>,
    /// Serializes snapshot publication; always taken before `state`
    publish_order: Mutex<()>,
    snapshots: watch::Sender<ChatSnapshot>,
}

struct SessionStart {
    request: ChatRequest,
    cancel: CancellationToken,
    started_at: i64,
}

/// Streaming chat session handle. Clones share the same conversation.
#[derive(Clone)]
pub struct ChatCompletion {
    inner: Arc<Inner>,
}

impl ChatCompletion {
    pub fn new(config: ChatConfig, transport: Arc<dyn ChatTransport>) -> Self {
        let (snapshots, _) = watch::channel(ChatSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                state: Mutex::new(SessionState::default()),
                publish_order: Mutex::new(()),
                snapshots,
            }),
        }
    }

    /// Session backed by [`HttpTransport`].
    pub fn with_http(config: ChatConfig) -> Self {
        Self::new(config, Arc::new(HttpTransport::new()))
    }

    pub fn config(&self) -> &ChatConfig {
        &self.inner.config
    }

    pub fn messages(&self) -> Conversation {
        self.inner.state.lock().conversation.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.lock().loading
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        let state = self.inner.state.lock();
        ChatSnapshot {
            messages: state.conversation.clone(),
            loading: state.loading,
        }
    }

    /// Receive a new [`ChatSnapshot`] after every conversation or loading change.
    pub fn subscribe(&self) -> watch::Receiver<ChatSnapshot> {
        self.inner.snapshots.subscribe()
    }

    /// Append `new_messages` plus a loading placeholder and stream the reply into it.
    ///
    /// Resolves once the request has settled, failed or been aborted. Errors
    /// are logged here and reported through [`SubmitOutcome`]; nothing is retried.
    pub async fn submit_prompt(&self, new_messages: Vec<MessageInput>) -> SubmitOutcome {
        let Some(SessionStart {
            request,
            cancel,
            started_at,
        }) = self.begin_session(new_messages)
        else {
            return SubmitOutcome::Rejected;
        };
        // Clears `loading` even if this future is dropped mid-flight
        let _session = ActiveSession { chat: self };

        match self.run_pipeline(&request, cancel.clone(), started_at).await {
            Ok(()) => SubmitOutcome::Completed,
            Err(e) if cancel.is_cancelled() => {
                tracing::warn!(error = %e, "Request aborted");
                if self.inner.config.finalize_on_abort {
                    self.finish_response(started_at);
                }
                SubmitOutcome::Aborted
            }
            Err(e) => {
                tracing::error!(error = %e, "Error during chat response streaming");
                SubmitOutcome::Failed(e)
            }
        }
    }

    /// Cancel the in-flight request, if any.
    ///
    /// The pending message is left as it is; `loading` clears once the
    /// pipeline has unwound.
    pub fn abort_response(&self) -> bool {
        let mut state = self.inner.state.lock();
        match state.cancel.take() {
            Some(cancel) => {
                cancel.cancel();
                tracing::info!("Abort requested");
                true
            }
            None => false,
        }
    }

    /// Clear the conversation. Ignored while a request is in flight.
    pub fn reset_messages(&self) -> bool {
        self.update(|state| {
            if state.loading {
                tracing::debug!("Reset ignored while loading");
                return None;
            }
            state.conversation = Conversation::new();
            Some(())
        })
        .is_some()
    }

    /// Replace the conversation wholesale. Ignored while a request is in flight.
    pub fn set_messages(&self, new_messages: Vec<MessageInput>) -> bool {
        self.update(|state| {
            if state.loading {
                tracing::debug!("Set messages ignored while loading");
                return None;
            }
            let now = now_millis();
            state.conversation = Conversation::from_messages(
                new_messages
                    .into_iter()
                    .map(|input| ChatMessage::from_input(input, now)),
            );
            Some(())
        })
        .is_some()
    }

    fn begin_session(&self, new_messages: Vec<MessageInput>) -> Option<SessionStart> {
        self.update(|state| Self::start_session(&self.inner.config, state, new_messages))
    }

    fn start_session(
        config: &ChatConfig,
        state: &mut SessionState,
        new_messages: Vec<MessageInput>,
    ) -> Option<SessionStart> {
        if state.loading || state.cancel.is_some() {
            tracing::debug!("Submission rejected: a request is already in flight");
            return None;
        }
        // An aborted placeholder stays loading until reset
        if state.conversation.pending().is_some() {
            tracing::debug!("Submission rejected: last message is still loading");
            return None;
        }
        if new_messages.is_empty() {
            return None;
        }

        let started_at = now_millis();
        let submitted = new_messages.len();
        let conversation = state.conversation.extend(
            new_messages
                .into_iter()
                .map(|input| ChatMessage::from_input(input, started_at))
                .chain(std::iter::once(ChatMessage::placeholder())),
        );

        let history: Vec<RequestMessage> = conversation
            .iter()
            .take(conversation.len() - 1)
            .map(ChatMessage::to_request_message)
            .collect();
        let request = ChatRequest::new(config.endpoint.clone(), &config.params, &history);

        let cancel = CancellationToken::new();
        state.conversation = conversation;
        state.cancel = Some(cancel.clone());
        state.loading = true;

        tracing::info!(
            submitted,
            history = history.len(),
            model = %config.params.model,
            "Submitting prompt"
        );

        Some(SessionStart {
            request,
            cancel,
            started_at,
        })
    }

    async fn run_pipeline(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
        started_at: i64,
    ) -> Result<()> {
        let reader = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StreamError::Cancelled),
            opened = self.inner.transport.open(request) => opened?,
        };

        let mut parser = FrameParser::new();
        let chunks = StreamPump::new(reader, cancel).into_stream();
        futures::pin_mut!(chunks);

        while let Some(chunk) = chunks.next().await {
            let deltas = parser.feed(&chunk?)?;
            self.apply_deltas(&deltas);
            if parser.is_done() {
                break;
            }
        }

        let deltas = parser.finish()?;
        self.apply_deltas(&deltas);

        self.finish_response(started_at);
        Ok(())
    }

    fn apply_deltas(&self, deltas: &[Delta]) {
        if deltas.is_empty() {
            return;
        }
        for delta in deltas {
            self.update(|state| {
                state.conversation =
                    apply_to_conversation(&state.conversation, delta, now_millis());
                Some(())
            });
        }
    }

    fn finish_response(&self, started_at: i64) {
        self.update(|state| {
            state.conversation = finalize(&state.conversation, started_at, now_millis());
            if let Some(last) = state.conversation.last() {
                tracing::info!(
                    response_time = %last.meta.response_time,
                    chunks = last.meta.chunks.len(),
                    "Response settled"
                );
            }
            Some(())
        });
    }

    fn end_session(&self) {
        self.update(|state| {
            state.cancel = None;
            state.loading = false;
            Some(())
        });
    }

    /// Run `f` under the state lock and publish the resulting snapshot when it
    /// returns `Some`.
    ///
    /// The snapshot is sent after the state lock is released, so observers may
    /// read the session while holding a `watch` borrow. `publish_order` keeps
    /// snapshots in the same order as the state changes they reflect.
    fn update<R>(&self, f: impl FnOnce(&mut SessionState) -> Option<R>) -> Option<R> {
        let _order = self.inner.publish_order.lock();
        let (result, snapshot) = {
            let mut state = self.inner.state.lock();
            let result = f(&mut state)?;
            let snapshot = ChatSnapshot {
                messages: state.conversation.clone(),
                loading: state.loading,
            };
            (result, snapshot)
        };
        self.inner.snapshots.send_replace(snapshot);
        Some(result)
    }
}

struct ActiveSession<'a> {
    chat: &'a ChatCompletion,
}

impl Drop for ActiveSession<'_> {
    fn drop(&mut self) {
        self.chat.end_session();
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
