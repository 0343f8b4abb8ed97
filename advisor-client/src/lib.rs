// advisor-client: minimal stdio client for tool servers speaking
// line-delimited JSON-RPC (initialize, tools/list, tools/call).

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};
use tracing::info;

pub mod protocol;
pub mod transport;

use protocol::*;

pub struct McpClient {
    transport: transport::StdioTransport,
    request_id: u64,
}

impl McpClient {
    pub fn new(mut process: Child) -> Result<Self> {
        let stdin = process
            .stdin
            .take()
            .context("Failed to get stdin from process")?;
        let stdout = process
            .stdout
            .take()
            .context("Failed to get stdout from process")?;

        Ok(Self {
            transport: transport::StdioTransport::new(stdin, stdout, process),
            request_id: 0,
        })
    }

    /// Client over arbitrary streams instead of a spawned process.
    pub fn from_io<W, R>(writer: W, reader: R) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
        R: AsyncRead + Unpin + Send + 'static,
    {
        Self {
            transport: transport::StdioTransport::from_io(writer, reader),
            request_id: 0,
        }
    }

    pub async fn connect(command: &str, args: &[String]) -> Result<Self> {
        let mut cmd = Command::new(command);
        for arg in args {
            cmd.arg(arg);
        }

        cmd.stdin(std::process::Stdio::piped());
        cmd.stdout(std::process::Stdio::piped());
        // Server logs go to our stderr
        cmd.stderr(std::process::Stdio::inherit());
        cmd.kill_on_drop(true);

        let process = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn tool server '{}'", command))?;

        info!("Spawned tool server: {}", command);
        Self::new(process)
    }

    pub async fn initialize(
        &mut self,
        client_name: &str,
        client_version: &str,
    ) -> Result<InitializeResult> {
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities {
                tools: Some(ToolsCapability {}),
            },
            client_info: ClientInfo {
                name: client_name.to_string(),
                version: client_version.to_string(),
            },
        };

        let response = self
            .request("initialize", Some(serde_json::to_value(params)?))
            .await?;

        self.notify("notifications/initialized", None).await?;

        serde_json::from_value(response).context("Failed to parse initialize response")
    }

    pub async fn list_tools(&mut self) -> Result<Vec<Tool>> {
        let response = self.request("tools/list", None).await?;
        let result: ListToolsResult =
            serde_json::from_value(response).context("Failed to parse tools list")?;
        Ok(result.tools)
    }

    /// Call a tool and return its text content. A result flagged as an
    /// error becomes an `Err` carrying the server's message.
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<String> {
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };

        let response = self
            .request("tools/call", Some(serde_json::to_value(params)?))
            .await?;
        let result: CallToolResult =
            serde_json::from_value(response).context("Failed to parse tool call result")?;

        if result.is_error.unwrap_or(false) {
            anyhow::bail!("{}", result.text());
        }
        Ok(result.text())
    }

    async fn request(&mut self, method: &str, params: Option<Value>) -> Result<Value> {
        self.request_id += 1;
        let request = JsonRpcRequest::new(json!(self.request_id), method, params);
        self.transport.send_request(&request).await
    }

    async fn notify(&mut self, method: &str, params: Option<Value>) -> Result<()> {
        let notification = JsonRpcNotification::new(method, params);
        self.transport.send_notification(&notification).await
    }
}
