use anyhow::{Context, Result};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tracing::debug;

use crate::protocol::*;

/// Newline-delimited JSON-RPC over a pair of byte streams, normally a
/// child process's stdin/stdout.
pub struct StdioTransport {
    writer: Box<dyn AsyncWrite + Unpin + Send>,
    reader: BufReader<Box<dyn AsyncRead + Unpin + Send>>,
    _process: Option<Child>,
}

impl StdioTransport {
    pub fn new(stdin: ChildStdin, stdout: ChildStdout, process: Child) -> Self {
        let mut transport = Self::from_io(stdin, stdout);
        transport._process = Some(process);
        transport
    }

    pub fn from_io<W, R>(writer: W, reader: R) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
        R: AsyncRead + Unpin + Send + 'static,
    {
        Self {
            writer: Box::new(writer),
            reader: BufReader::new(Box::new(reader)),
            _process: None,
        }
    }

    pub async fn send_request(&mut self, request: &JsonRpcRequest) -> Result<Value> {
        let request_str = serde_json::to_string(request)?;
        debug!("Sending request: {}", request_str);
        self.write_line(&request_str).await?;

        // Skip anything that is not the reply to this request, such as
        // server-initiated notifications.
        loop {
            let mut response_line = String::new();
            let read = self.reader.read_line(&mut response_line).await?;
            if read == 0 {
                anyhow::bail!("Tool server closed the connection");
            }
            let line = response_line.trim();
            if line.is_empty() {
                continue;
            }
            debug!("Received: {}", line);

            let value: Value =
                serde_json::from_str(line).context("Failed to parse JSON-RPC message")?;
            if value.get("id") != Some(&request.id) {
                debug!("Ignoring unrelated message");
                continue;
            }

            let response: JsonRpcResponse =
                serde_json::from_value(value).context("Failed to parse JSON-RPC response")?;
            if let Some(error) = response.error {
                anyhow::bail!("RPC error {}: {}", error.code, error.message);
            }
            return response.result.context("No result in response");
        }
    }

    pub async fn send_notification(&mut self, notification: &JsonRpcNotification) -> Result<()> {
        let notification_str = serde_json::to_string(notification)?;
        debug!("Sending notification: {}", notification_str);
        self.write_line(&notification_str).await
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}
