// JSONL transcript sink: one line per finished conversation.

use advisor_host::{Transcript, TranscriptSink};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

pub struct JsonlTranscriptSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlTranscriptSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TranscriptSink for JsonlTranscriptSink {
    async fn persist(&self, transcript: &Transcript) -> Result<()> {
        let mut line = serde_json::to_string(transcript)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!(
            "Wrote transcript {} to {}",
            transcript.conversation_id,
            self.path.display()
        );
        Ok(())
    }
}
