// advisor-host: streaming tool-augmented dialogue orchestration.
//
// Model deltas flow through the tag buffer and classifier into regions;
// tool regions are decoded and dispatched to capability providers; the turn
// controller loops until the model answers; the emitter is the single writer
// to the client channel.

pub mod buffer;
pub mod classifier;
pub mod config;
pub mod conversation;
pub mod decoder;
pub mod dispatcher;
pub mod emitter;
pub mod llm;
pub mod message;
pub mod prompts;
pub mod providers;
pub mod retry;
pub mod streaming_interceptor;
pub mod tags;
pub mod transcript;
pub mod turn_controller;

// Re-export main types
pub use buffer::TagBuffer;
pub use classifier::extract_regions;
pub use config::{ControllerConfig, DispatchMode};
pub use conversation::Conversation;
pub use decoder::{decode, DecodeError};
pub use dispatcher::{
    CapabilityProvider, ProviderError, ProviderOutput, ProviderRegistry, ToolDispatcher,
};
pub use emitter::{ClientEvent, ClientGone, EventEmitter, EventKind};
pub use llm::{DeltaStream, OllamaTokenSource, SourceError, TokenSource};
pub use message::{
    ConversationMessage, Region, RegionKind, Role, StreamDelta, ToolCall, ToolOutcome,
    TurnResult,
};
pub use prompts::PromptTemplate;
pub use providers::McpToolProvider;
pub use retry::{RetryStrategy, RetryingProvider};
pub use streaming_interceptor::StreamingInterceptor;
pub use transcript::{MemoryTranscriptSink, Transcript, TranscriptSink};
pub use turn_controller::{ConversationOutcome, TurnController, TurnError, TurnState};
