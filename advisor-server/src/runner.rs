// Stdio runner - one JSON request per input line, one JSON event per output
// line. Conversations run one at a time; requests and rejections that arrive
// meanwhile are queued in order.

use advisor_host::{
    ClientEvent, ControllerConfig, Conversation, ConversationMessage, EventEmitter,
    OllamaTokenSource, PromptTemplate, TokenSource, ToolDispatcher, TranscriptSink,
    TurnController,
};
use anyhow::Result;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::{debug, error, info, warn};

use crate::config::AdvisorConfig;
use crate::tools::build_registry;
use crate::transcript_log::JsonlTranscriptSink;

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Replaces the configured preamble for this request.
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub history: Vec<ConversationMessage>,
    pub message: String,
}

#[derive(Debug)]
enum Incoming {
    Chat(ChatRequest),
    Cancel,
    Invalid(String),
    Blank,
}

fn parse_incoming(line: &str) -> Incoming {
    let line = line.trim();
    if line.is_empty() {
        return Incoming::Blank;
    }
    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => return Incoming::Invalid(format!("invalid JSON: {}", e)),
    };
    if value.get("cancel").and_then(Value::as_bool) == Some(true) {
        return Incoming::Cancel;
    }
    match serde_json::from_value(value) {
        Ok(request) => Incoming::Chat(request),
        Err(e) => Incoming::Invalid(format!("invalid request: {}", e)),
    }
}

pub struct Runner {
    source: Arc<dyn TokenSource>,
    dispatcher: ToolDispatcher,
    config: ControllerConfig,
    preamble: String,
    sink: Option<Arc<dyn TranscriptSink>>,
    conversations: u64,
}

impl Runner {
    pub fn new(
        source: Arc<dyn TokenSource>,
        dispatcher: ToolDispatcher,
        config: ControllerConfig,
    ) -> Self {
        Self {
            source,
            dispatcher,
            config,
            preamble: String::new(),
            sink: None,
            conversations: 0,
        }
    }

    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = preamble.into();
        self
    }

    pub fn with_transcript_sink(mut self, sink: Arc<dyn TranscriptSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Ollama source, registered tools and transcript log from `config`.
    pub async fn from_config(config: AdvisorConfig) -> Result<Self> {
        let mut source = OllamaTokenSource::with_config(
            config.model.model.as_str(),
            &config.model.base_url,
            Duration::from_secs(config.model.timeout_secs),
        );
        if let Some(temperature) = config.model.temperature {
            source = source.with_temperature(temperature);
        }

        let registry = build_registry(&config).await?;
        info!("{} tools available", registry.len());

        let mut runner = Self::new(
            Arc::new(source),
            ToolDispatcher::new(registry),
            config.controller,
        )
        .with_preamble(config.system_prompt.unwrap_or_default());
        if let Some(path) = config.transcript_log {
            runner = runner.with_transcript_sink(Arc::new(JsonlTranscriptSink::new(path)));
        }
        Ok(runner)
    }

    /// Serve requests from `input` until it ends, writing events to `output`.
    ///
    /// End of input stops accepting requests; the running and queued ones
    /// still finish. If `output` fails, the client is gone: the running
    /// conversation is cancelled and nothing further is started.
    pub async fn run<R, W>(mut self, input: R, output: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let writer = tokio::spawn(write_events(events_rx, output));

        let mut lines = FramedRead::new(input, LinesCodec::new());
        // Only `Chat` and `Invalid` entries are ever queued.
        let mut queue: VecDeque<Incoming> = VecDeque::new();
        let mut input_open = true;

        info!("Runner ready, waiting for requests...");

        loop {
            if events_tx.is_closed() {
                warn!("Client output closed; dropping {} queued requests", queue.len());
                break;
            }

            let next = match queue.pop_front() {
                Some(queued) => queued,
                None if !input_open => break,
                None => match lines.next().await {
                    Some(Ok(line)) => parse_incoming(&line),
                    Some(Err(e)) => {
                        error!("Read error: {}", e);
                        input_open = false;
                        continue;
                    }
                    None => {
                        info!("Input closed");
                        input_open = false;
                        continue;
                    }
                },
            };

            let request = match next {
                Incoming::Chat(request) => request,
                Incoming::Cancel => {
                    debug!("Cancel received with no conversation running");
                    continue;
                }
                Incoming::Invalid(message) => {
                    warn!("Rejected request line: {}", message);
                    reject(&events_tx, message).await;
                    continue;
                }
                Incoming::Blank => continue,
            };

            let controller = self.controller_for(&request, events_tx.clone());
            let token = controller.cancellation_token();
            let conversation = controller.run(&request.message);
            tokio::pin!(conversation);

            let outcome = loop {
                tokio::select! {
                    outcome = &mut conversation => break outcome,
                    line = lines.next(), if input_open => match line {
                        Some(Ok(line)) => match parse_incoming(&line) {
                            Incoming::Cancel => {
                                info!("Cancel requested");
                                token.cancel();
                            }
                            Incoming::Blank => {}
                            // Answered after the running conversation's complete.
                            queued => {
                                debug!("Queued line behind running conversation");
                                queue.push_back(queued);
                            }
                        },
                        Some(Err(e)) => {
                            error!("Read error: {}", e);
                            input_open = false;
                        }
                        None => {
                            info!("Input closed; finishing current work");
                            input_open = false;
                        }
                    },
                }
            };

            info!(
                "Conversation finished as {:?} after {} turns",
                outcome.state, outcome.turns
            );
        }

        drop(events_tx);
        match writer.await? {
            Ok(()) => {}
            Err(e) => warn!("Client output failed: {:#}", e),
        }
        info!("Runner shutting down");
        Ok(())
    }

    fn controller_for(
        &mut self,
        request: &ChatRequest,
        events: mpsc::Sender<ClientEvent>,
    ) -> TurnController {
        self.conversations += 1;
        let id = request
            .conversation_id
            .clone()
            .unwrap_or_else(|| format!("conversation-{}", self.conversations));
        let preamble = request.system_prompt.as_deref().unwrap_or(&self.preamble);
        let system_prompt = PromptTemplate::new(preamble).render(self.dispatcher.registry());

        let mut controller = TurnController::new(
            self.source.clone(),
            self.dispatcher.clone(),
            self.config.clone(),
            EventEmitter::new(events),
        )
        .with_conversation_id(id)
        .with_system_prompt(system_prompt)
        .with_history(Conversation::from_messages(request.history.clone()));
        if let Some(sink) = &self.sink {
            controller = controller.with_transcript_sink(sink.clone());
        }
        controller
    }
}

// A malformed request still gets a framed reply: error then complete.
async fn reject(events: &mpsc::Sender<ClientEvent>, message: String) {
    let mut emitter = EventEmitter::new(events.clone());
    let _ = emitter.error(message).await;
    emitter.complete().await;
}

async fn write_events<W>(mut events: mpsc::Receiver<ClientEvent>, mut output: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(event) = events.recv().await {
        let line = serde_json::to_string(&event)?;
        debug!("Sending: {}", line);
        output.write_all(line.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
    }
    Ok(())
}
