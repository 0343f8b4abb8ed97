use super::{DeltaStream, SourceError, TokenSource};
use crate::message::{ConversationMessage, Role, StreamDelta};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;
use tracing::debug;

/// Streams `/api/chat` from an Ollama server as newline-delimited JSON.
#[derive(Debug, Clone)]
pub struct OllamaTokenSource {
    client: Client,
    base_url: String,
    model: String,
    timeout: Duration,
    temperature: Option<f32>,
}

impl OllamaTokenSource {
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_config(model, "http://localhost:11434", Duration::from_secs(120))
    }

    pub fn with_config(model: impl Into<String>, base_url: &str, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            timeout,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::ToolResult => "tool",
    }
}

fn parse_line(line: &str) -> Option<Result<StreamDelta, SourceError>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let chunk: ChatChunk = match serde_json::from_str(line) {
        Ok(chunk) => chunk,
        Err(e) => return Some(Err(SourceError::Decode(e.to_string()))),
    };
    if let Some(error) = chunk.error {
        return Some(Err(SourceError::Stream(error)));
    }
    Some(Ok(StreamDelta {
        text: chunk.message.map(|m| m.content).unwrap_or_default(),
        is_final: chunk.done,
    }))
}

#[async_trait]
impl TokenSource for OllamaTokenSource {
    async fn open(
        &self,
        system_prompt: &str,
        history: &[ConversationMessage],
    ) -> Result<DeltaStream, SourceError> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if !system_prompt.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: system_prompt,
            });
        }
        messages.extend(history.iter().map(|m| ChatMessage {
            role: role_name(m.role),
            content: &m.content,
        }));

        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: true,
            options: self.temperature.map(|temperature| ChatOptions { temperature }),
        };

        debug!(
            "Opening Ollama stream for {} with {} messages",
            self.model,
            request.messages.len()
        );

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SourceError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status { status, body });
        }

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other));
        let lines = FramedRead::new(StreamReader::new(bytes), LinesCodec::new());

        let deltas = lines.filter_map(|line| async move {
            match line {
                Ok(line) => parse_line(&line),
                Err(e) => Some(Err(SourceError::Stream(e.to_string()))),
            }
        });

        Ok(Box::pin(deltas))
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
