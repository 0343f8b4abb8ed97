pub mod ollama;

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

use crate::message::{ConversationMessage, StreamDelta};

pub use ollama::OllamaTokenSource;

/// Deltas for one model turn. Dropping the stream aborts the request.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<StreamDelta, SourceError>> + Send>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("token source unreachable: {0}")]
    Unreachable(String),
    #[error("token source returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("token stream failed: {0}")]
    Stream(String),
    #[error("could not decode token stream: {0}")]
    Decode(String),
}

/// Produces the model's incremental output for a given history.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn open(
        &self,
        system_prompt: &str,
        history: &[ConversationMessage],
    ) -> Result<DeltaStream, SourceError>;

    fn name(&self) -> &str;
}
