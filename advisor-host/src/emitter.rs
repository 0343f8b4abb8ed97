// Event emitter - the only writer to a client channel.
// Events leave in the order the controller resolves them; `complete` is
// sent at most once and nothing follows it. After cancellation `complete` is
// the only event still delivered, and only while the client is connected.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::message::{Region, ToolCall, ToolOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Thinking,
    ToolCall,
    ToolResult,
    Response,
    Error,
    Complete,
}

/// One JSON object on the client channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_data: Option<String>,
}

impl ClientEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            content: None,
            tool_data: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_tool_data(mut self, data: &Value) -> Self {
        self.tool_data = Some(data.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("client channel closed")]
pub struct ClientGone;

pub struct EventEmitter {
    tx: mpsc::Sender<ClientEvent>,
    cancel: Option<CancellationToken>,
    closed: bool,
    completed: bool,
}

impl EventEmitter {
    pub fn new(tx: mpsc::Sender<ClientEvent>) -> Self {
        Self {
            tx,
            cancel: None,
            closed: false,
            completed: false,
        }
    }

    /// Once `token` is cancelled the emitter refuses everything but `complete`.
    pub fn bind_cancellation(&mut self, token: CancellationToken) {
        self.cancel = Some(token);
    }

    /// Emitter plus the receiving end the transport drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ClientEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    pub fn is_closed(&self) -> bool {
        self.is_disconnected() || self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    /// True once the receiver is dropped, a send failed or `close` was called.
    pub fn is_disconnected(&self) -> bool {
        self.closed || self.tx.is_closed()
    }

    /// Resolves when the receiving end is dropped.
    pub fn disconnected(&self) -> impl Future<Output = ()> + Send + 'static {
        let tx = self.tx.clone();
        async move { tx.closed().await }
    }

    /// Stop emitting for good. Used when the client has gone away.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub async fn emit(&mut self, event: ClientEvent) -> Result<(), ClientGone> {
        if self.is_closed() || self.completed {
            return Err(ClientGone);
        }
        debug!("Emitting {:?} event", event.kind);
        if event.kind == EventKind::Complete {
            self.completed = true;
        }
        if self.tx.send(event).await.is_err() {
            self.closed = true;
            return Err(ClientGone);
        }
        Ok(())
    }

    pub async fn thinking(&mut self, region: &Region) -> Result<(), ClientGone> {
        self.emit(ClientEvent::new(EventKind::Thinking).with_content(region.text.trim()))
            .await
    }

    pub async fn tool_call(&mut self, call: &ToolCall) -> Result<(), ClientGone> {
        let parameters = Value::Object(call.parameters.clone());
        self.emit(
            ClientEvent::new(EventKind::ToolCall)
                .with_content(call.name.as_str())
                .with_tool_data(&parameters),
        )
        .await
    }

    pub async fn tool_result(&mut self, outcome: &ToolOutcome) -> Result<(), ClientGone> {
        let content = if outcome.ok {
            outcome.payload.as_str()
        } else {
            outcome.error_message.as_deref().unwrap_or("tool failed")
        };
        let data = json!({
            "name": outcome.call.as_ref().map(|c| c.name.as_str()),
            "ok": outcome.ok,
        });
        self.emit(
            ClientEvent::new(EventKind::ToolResult)
                .with_content(content)
                .with_tool_data(&data),
        )
        .await
    }

    pub async fn response(&mut self, region: &Region) -> Result<(), ClientGone> {
        self.emit(ClientEvent::new(EventKind::Response).with_content(region.text.trim()))
            .await
    }

    pub async fn error(&mut self, message: impl Into<String>) -> Result<(), ClientGone> {
        self.emit(ClientEvent::new(EventKind::Error).with_content(message))
            .await
    }

    /// Send `complete` unless the client is gone or it was already sent.
    /// Cancellation does not suppress it.
    pub async fn complete(&mut self) {
        if self.is_disconnected() || self.completed {
            return;
        }
        debug!("Emitting {:?} event", EventKind::Complete);
        self.completed = true;
        if self.tx.send(ClientEvent::new(EventKind::Complete)).await.is_err() {
            self.closed = true;
        }
    }
}
