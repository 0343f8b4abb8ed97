// Capability providers backed by external tool servers.

use advisor_client::protocol::Tool;
use advisor_client::McpClient;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::dispatcher::{CapabilityProvider, ProviderOutput, ProviderRegistry};

/// One tool exposed by a connected tool server. Providers for the same
/// server share the client; calls to that server are serialized.
pub struct McpToolProvider {
    client: Arc<Mutex<McpClient>>,
    tool: String,
    description: String,
}

impl McpToolProvider {
    pub fn new(client: Arc<Mutex<McpClient>>, tool: impl Into<String>) -> Self {
        Self {
            client,
            tool: tool.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn tool_name(&self) -> &str {
        &self.tool
    }

    /// List the server's tools and register one provider per tool.
    /// Returns the tools that were registered.
    pub async fn register_all(
        client: Arc<Mutex<McpClient>>,
        registry: &mut ProviderRegistry,
    ) -> Result<Vec<Tool>> {
        let tools = client.lock().await.list_tools().await?;
        for tool in &tools {
            let provider = McpToolProvider::new(client.clone(), tool.name.as_str())
                .with_description(tool.description.as_str());
            registry.register(tool.name.as_str(), provider);
        }
        Ok(tools)
    }
}

#[async_trait]
impl CapabilityProvider for McpToolProvider {
    async fn invoke(&self, parameters: Map<String, Value>) -> Result<ProviderOutput> {
        debug!("Forwarding {} to tool server", self.tool);
        let mut client = self.client.lock().await;
        let text = client.call_tool(&self.tool, Value::Object(parameters)).await?;
        Ok(ProviderOutput::new(text))
    }

    fn description(&self) -> &str {
        &self.description
    }
}
