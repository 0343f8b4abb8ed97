// Turn controller - drives a client request through model turns until the
// model produces an answer with no tool calls outstanding.
//
// STREAMING -> DISPATCHING -> APPENDING -> STREAMING ... -> DONE
//                                 \-> DONE          FAILED / CANCELLED from anywhere
//
// Streaming and dispatching never overlap: every tool region of a turn is
// collected before the first provider is contacted, and every outcome is in
// history before the next model call.

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{ControllerConfig, DispatchMode};
use crate::conversation::Conversation;
use crate::decoder::{decode, DecodeError};
use crate::dispatcher::ToolDispatcher;
use crate::emitter::{ClientGone, EventEmitter};
use crate::llm::{SourceError, TokenSource};
use crate::message::{Region, RegionKind, ToolCall, ToolOutcome, TurnResult};
use crate::streaming_interceptor::StreamingInterceptor;
use crate::tags::contains_open_tag;
use crate::transcript::{Transcript, TranscriptSink};

const MISSING_ANSWER_NOTE: &str = "Your previous response contained neither a <tool> call nor an \
<answer>. Reply with one or more <tool> blocks or a single <answer> block.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Streaming,
    Dispatching,
    Appending,
    Done,
    Failed,
    Cancelled,
}

impl TurnState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TurnState::Done | TurnState::Failed | TurnState::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("no answer after {0} model turns")]
    TurnLimit(usize),
    #[error("model produced {0} consecutive responses without a tool call or answer")]
    MalformedOutput(usize),
    #[error("conversation cancelled")]
    Cancelled,
}

impl From<ClientGone> for TurnError {
    fn from(_: ClientGone) -> Self {
        TurnError::Cancelled
    }
}

/// Final result of one client request.
#[derive(Debug)]
pub struct ConversationOutcome {
    pub state: TurnState,
    pub answer: Option<String>,
    pub error: Option<TurnError>,
    pub turns: usize,
    pub history: Conversation,
}

/// Owns everything for one conversation. Nothing here is shared with other
/// conversations except the token source and the provider registry.
pub struct TurnController {
    conversation_id: String,
    source: Arc<dyn TokenSource>,
    dispatcher: ToolDispatcher,
    config: ControllerConfig,
    system_prompt: String,
    history: Conversation,
    emitter: EventEmitter,
    cancel: CancellationToken,
    sink: Option<Arc<dyn TranscriptSink>>,
    state: TurnState,
    turns: usize,
    malformed_streak: usize,
    /// Tool calls decoded in the current turn whose outcomes are not yet in history.
    pending_tools: usize,
}

impl TurnController {
    pub fn new(
        source: Arc<dyn TokenSource>,
        dispatcher: ToolDispatcher,
        config: ControllerConfig,
        emitter: EventEmitter,
    ) -> Self {
        let cancel = CancellationToken::new();
        let mut emitter = emitter;
        emitter.bind_cancellation(cancel.clone());
        Self {
            conversation_id: "anonymous".to_string(),
            source,
            dispatcher,
            config,
            system_prompt: String::new(),
            history: Conversation::new(),
            emitter,
            cancel,
            sink: None,
            state: TurnState::Streaming,
            turns: 0,
            malformed_streak: 0,
            pending_tools: 0,
        }
    }

    pub fn with_conversation_id(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = id.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_history(mut self, history: Conversation) -> Self {
        self.history = history;
        self
    }

    pub fn with_transcript_sink(mut self, sink: Arc<dyn TranscriptSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Tie this conversation to an externally owned token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.emitter.bind_cancellation(token.clone());
        self.cancel = token;
        self
    }

    /// Token that cancels this conversation, e.g. on client disconnect.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Run one client request to a terminal state.
    pub async fn run(mut self, user_message: &str) -> ConversationOutcome {
        info!(
            "Conversation {}: new request ({} prior messages)",
            self.conversation_id,
            self.history.len()
        );
        self.history.push_user(user_message);

        let result = self.drive().await;

        let (state, answer, error) = match result {
            Ok(answer) => (TurnState::Done, Some(answer.text.trim().to_string()), None),
            Err(TurnError::Cancelled) => (TurnState::Cancelled, None, Some(TurnError::Cancelled)),
            Err(e) => (TurnState::Failed, None, Some(e)),
        };
        self.transition(state);

        match self.state {
            TurnState::Cancelled => {
                // A client still listening gets `complete`; a departed one gets nothing.
                self.cancel.cancel();
                if self.emitter.is_disconnected() {
                    info!("Conversation {}: client disconnected", self.conversation_id);
                    self.emitter.close();
                }
            }
            TurnState::Failed => {
                let message = error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "tool calls still pending".to_string());
                error!("Conversation {} failed: {}", self.conversation_id, message);
                let _ = self.emitter.error(message).await;
            }
            _ => {}
        }
        self.emitter.complete().await;
        self.persist().await;

        ConversationOutcome {
            state: self.state,
            answer: if self.state == TurnState::Done { answer } else { None },
            error,
            turns: self.turns,
            history: self.history,
        }
    }

    async fn drive(&mut self) -> Result<Region, TurnError> {
        loop {
            if self.turns >= self.config.max_turns {
                return Err(TurnError::TurnLimit(self.config.max_turns));
            }
            self.turns += 1;
            self.transition(TurnState::Streaming);

            let turn = self.stream_turn().await?;
            if !turn.raw_trailing.trim().is_empty() {
                warn!(
                    "Discarding {} bytes of unterminated model output",
                    turn.raw_trailing.len()
                );
                self.emitter
                    .error("discarded unterminated model output")
                    .await?;
            }
            if !turn.assistant_text.is_empty() {
                self.history.push_assistant(&turn.assistant_text);
            }

            if turn.has_pending_tools() {
                self.malformed_streak = 0;
                if turn.answer_region.is_some() {
                    warn!("Answer emitted alongside tool calls; discarding answer");
                    let violation = DecodeError::ProtocolViolation(
                        "answer discarded because tool calls were still pending".to_string(),
                    );
                    self.emitter.error(violation.to_string()).await?;
                }

                self.pending_tools = turn.pending_tool_calls.len();
                self.transition(TurnState::Dispatching);
                let outcomes = self.dispatch_all(turn.pending_tool_calls).await?;

                self.transition(TurnState::Appending);
                for outcome in &outcomes {
                    self.history.push_tool_outcome(outcome);
                }
                self.pending_tools = 0;
                continue;
            }

            if let Some(answer) = turn.answer_region {
                self.transition(TurnState::Appending);
                self.emitter.response(&answer).await?;
                return Ok(answer);
            }

            self.malformed_streak += 1;
            warn!(
                "Turn {} produced neither tool calls nor an answer ({} in a row)",
                self.turns, self.malformed_streak
            );
            if self.malformed_streak > self.config.max_malformed_turns {
                return Err(TurnError::MalformedOutput(self.malformed_streak));
            }
            self.emitter
                .error("model response had no tool call or answer; retrying")
                .await?;
            self.history.push_system(MISSING_ANSWER_NOTE);
        }
    }

    async fn stream_turn(&mut self) -> Result<TurnResult, TurnError> {
        let gone = self.emitter.disconnected();
        tokio::pin!(gone);

        let mut stream = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(TurnError::Cancelled),
            _ = &mut gone => return Err(TurnError::Cancelled),
            opened = self.source.open(&self.system_prompt, self.history.messages()) => opened?,
        };

        let mut interceptor = StreamingInterceptor::new();
        let mut turn = TurnResult::default();

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(TurnError::Cancelled),
                _ = &mut gone => {
                    debug!("Client left while {} was streaming", self.source.name());
                    return Err(TurnError::Cancelled);
                }
                next = stream.next() => next,
            };
            let delta = match next {
                Some(Ok(delta)) => delta,
                Some(Err(e)) => return Err(e.into()),
                None => {
                    warn!("Token stream from {} ended without a final marker", self.source.name());
                    break;
                }
            };

            for region in interceptor.push(&delta.text) {
                self.on_region(region, &mut turn).await?;
            }
            if delta.is_final {
                break;
            }
        }
        // Releases the model connection before any tool runs.
        drop(stream);

        let (raw, trailing) = interceptor.finish();
        turn.assistant_text = raw;
        turn.raw_trailing = trailing;
        Ok(turn)
    }

    async fn on_region(&mut self, region: Region, turn: &mut TurnResult) -> Result<(), TurnError> {
        debug!("Region {:?} ({} bytes)", region.kind, region.text.len());
        match region.kind {
            RegionKind::Thinking => {
                if contains_open_tag(&region.text) {
                    self.report_violation("nested tag inside thinking").await?;
                } else {
                    self.emitter.thinking(&region).await?;
                }
            }
            RegionKind::Tool => match decode(&region) {
                Ok(call) => {
                    info!("Tool call requested: {}", call.name);
                    self.emitter.tool_call(&call).await?;
                    turn.pending_tool_calls.push(Ok(call));
                }
                Err(e) => {
                    warn!("Rejected tool region: {}", e);
                    self.emitter.error(e.to_string()).await?;
                    turn.pending_tool_calls.push(Err(e));
                }
            },
            RegionKind::Answer => {
                if contains_open_tag(&region.text) {
                    self.report_violation("nested tag inside answer").await?;
                } else if turn.answer_region.is_some() {
                    self.report_violation("more than one answer in a turn").await?;
                } else {
                    turn.answer_region = Some(region);
                }
            }
        }
        Ok(())
    }

    async fn report_violation(&mut self, what: &str) -> Result<(), TurnError> {
        let violation = DecodeError::ProtocolViolation(format!("{}; region discarded", what));
        warn!("{}", violation);
        self.emitter.error(violation.to_string()).await?;
        Ok(())
    }

    /// Execute a turn's tool calls and return their outcomes in call order.
    async fn dispatch_all(
        &mut self,
        calls: Vec<Result<ToolCall, DecodeError>>,
    ) -> Result<Vec<ToolOutcome>, TurnError> {
        let mut slots: Vec<Option<ToolOutcome>> = vec![None; calls.len()];
        let mut runnable = Vec::new();
        for (index, call) in calls.into_iter().enumerate() {
            match call {
                Ok(call) => runnable.push((index, call)),
                // Already reported when the region was rejected.
                Err(e) => slots[index] = Some(ToolOutcome::rejected(&e)),
            }
        }

        info!(
            "Dispatching {} tool calls ({:?})",
            runnable.len(),
            self.config.dispatch
        );

        let gone = self.emitter.disconnected();
        tokio::pin!(gone);

        match self.config.dispatch {
            DispatchMode::Parallel => {
                let mut in_flight: FuturesUnordered<_> = runnable
                    .into_iter()
                    .map(|(index, call)| spawn_dispatch(&self.dispatcher, index, call))
                    .collect();

                while !in_flight.is_empty() {
                    let next = tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => {
                            debug!(
                                "Discarding results of {} in-flight tool calls",
                                in_flight.len()
                            );
                            return Err(TurnError::Cancelled);
                        }
                        _ = &mut gone => return Err(TurnError::Cancelled),
                        next = in_flight.next() => next,
                    };
                    let Some((index, outcome)) = next else {
                        break;
                    };
                    self.emitter.tool_result(&outcome).await?;
                    slots[index] = Some(outcome);
                }
            }
            DispatchMode::Sequential => {
                for (index, call) in runnable {
                    if self.cancel.is_cancelled() {
                        return Err(TurnError::Cancelled);
                    }
                    let task = spawn_dispatch(&self.dispatcher, index, call);
                    let (index, outcome) = tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Err(TurnError::Cancelled),
                        _ = &mut gone => return Err(TurnError::Cancelled),
                        done = task => done,
                    };
                    self.emitter.tool_result(&outcome).await?;
                    slots[index] = Some(outcome);
                }
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }

    fn transition(&mut self, next: TurnState) {
        let next = if next == TurnState::Done && self.pending_tools > 0 {
            error!(
                "Refusing to finish with {} tool calls pending",
                self.pending_tools
            );
            TurnState::Failed
        } else {
            next
        };
        if self.state != next {
            info!(
                "Conversation {}: {:?} -> {:?} (turn {})",
                self.conversation_id, self.state, next, self.turns
            );
        }
        self.state = next;
    }

    async fn persist(&self) {
        let Some(sink) = &self.sink else {
            return;
        };
        let transcript = Transcript {
            conversation_id: self.conversation_id.clone(),
            state: self.state,
            turns: self.turns,
            messages: self.history.messages().to_vec(),
            finished_at: chrono::Utc::now(),
        };
        if let Err(e) = sink.persist(&transcript).await {
            error!("Failed to persist transcript {}: {:#}", self.conversation_id, e);
        }
    }
}

// Runs the call on its own task. If the conversation is cancelled the task
// still finishes, but nobody is left to read its outcome.
fn spawn_dispatch(
    dispatcher: &ToolDispatcher,
    index: usize,
    call: ToolCall,
) -> impl Future<Output = (usize, ToolOutcome)> + Send + 'static {
    let dispatcher = dispatcher.clone();
    let fallback = call.clone();
    let handle = tokio::spawn(async move { dispatcher.dispatch(call).await });
    async move {
        match handle.await {
            Ok(outcome) => (index, outcome),
            Err(e) => (
                index,
                ToolOutcome::failure(fallback, format!("tool task failed: {}", e)),
            ),
        }
    }
}
