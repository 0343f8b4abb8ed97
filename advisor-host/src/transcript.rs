// Transcript hand-off - where the history goes once a request ends.
// Storage itself lives outside this crate.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;

use crate::message::ConversationMessage;
use crate::turn_controller::TurnState;

#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    pub conversation_id: String,
    pub state: TurnState,
    pub turns: usize,
    pub messages: Vec<ConversationMessage>,
    pub finished_at: DateTime<Utc>,
}

#[async_trait]
pub trait TranscriptSink: Send + Sync {
    async fn persist(&self, transcript: &Transcript) -> Result<()>;
}

/// Keeps transcripts in memory. Handy for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryTranscriptSink {
    transcripts: Mutex<Vec<Transcript>>,
}

impl MemoryTranscriptSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transcripts(&self) -> Vec<Transcript> {
        self.transcripts
            .lock()
            .map(|t| t.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TranscriptSink for MemoryTranscriptSink {
    async fn persist(&self, transcript: &Transcript) -> Result<()> {
        self.transcripts
            .lock()
            .map_err(|_| anyhow::anyhow!("transcript store poisoned"))?
            .push(transcript.clone());
        Ok(())
    }
}
