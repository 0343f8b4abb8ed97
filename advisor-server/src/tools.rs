// Command-backed capability providers. Every tool is declared in YAML;
// nothing the model sends can add a tool or reach a shell.

use advisor_client::McpClient;
use advisor_host::{
    CapabilityProvider, McpToolProvider, ProviderOutput, ProviderRegistry, RetryStrategy,
    RetryingProvider,
};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::AdvisorConfig;
use crate::validation::validate_typed_value;

#[derive(Debug, Clone, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<ArgDefinition>,
    #[serde(default)]
    pub static_flags: Vec<String>,
    /// Extra attempts after a failed run.
    #[serde(default)]
    pub retries: u32,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArgDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "type", default = "default_arg_type")]
    pub arg_type: String,
    pub cli_flag: Option<String>,
}

fn default_arg_type() -> String {
    "string".to_string()
}

/// Runs a configured executable. Stdout is the payload; a non-zero exit is
/// a provider error carrying stderr.
pub struct CommandProvider {
    definition: ToolDefinition,
}

impl CommandProvider {
    pub fn new(definition: ToolDefinition) -> Self {
        Self { definition }
    }

    // Direct argv construction: static flags, then declared args in
    // declaration order. Undeclared parameters are ignored.
    fn build_args(&self, parameters: &Map<String, Value>) -> Result<Vec<String>> {
        let mut argv = self.definition.static_flags.clone();

        for arg in &self.definition.args {
            let Some(value) = parameters.get(&arg.name) else {
                if arg.required {
                    bail!("Missing required parameter '{}'", arg.name);
                }
                continue;
            };
            validate_typed_value(value, &arg.arg_type)
                .with_context(|| format!("Invalid parameter '{}'", arg.name))?;

            let values = match value {
                Value::Array(items) => items.iter().map(argument_text).collect(),
                other => vec![argument_text(other)],
            };
            for text in values {
                if let Some(flag) = &arg.cli_flag {
                    argv.push(flag.clone());
                }
                argv.push(text);
            }
        }

        for name in parameters.keys() {
            if !self.definition.args.iter().any(|a| &a.name == name) {
                debug!("Ignoring undeclared parameter '{}' for {}", name, self.definition.name);
            }
        }

        Ok(argv)
    }
}

fn argument_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl CapabilityProvider for CommandProvider {
    async fn invoke(&self, parameters: Map<String, Value>) -> Result<ProviderOutput> {
        let argv = self.build_args(&parameters)?;

        let mut cmd = Command::new(&self.definition.command);
        cmd.args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Executing command: {:?}", cmd);

        let run = cmd.output();
        let output = match self.definition.timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), run)
                .await
                .with_context(|| format!("Command timed out after {}s", secs))?,
            None => run.await,
        }
        .with_context(|| format!("Failed to execute '{}'", self.definition.command))?;

        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            Ok(ProviderOutput::new(stdout.trim()))
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("Command failed ({}): {}", output.status, stderr.trim())
        }
    }

    fn description(&self) -> &str {
        &self.definition.description
    }
}

/// Register every configured command tool and every tool advertised by the
/// configured tool servers.
pub async fn build_registry(config: &AdvisorConfig) -> Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();

    for tool in &config.tools {
        let provider = CommandProvider::new(tool.clone());
        if tool.retries > 0 {
            let strategy = RetryStrategy::new(tool.retries, RetryStrategy::default().base_delay_ms);
            registry.register(tool.name.as_str(), RetryingProvider::new(provider, strategy));
        } else {
            registry.register(tool.name.as_str(), provider);
        }
    }

    for server in &config.mcp_servers {
        let mut client = McpClient::connect(&server.command, &server.args)
            .await
            .with_context(|| format!("Failed to start tool server '{}'", server.name))?;
        client
            .initialize("advisor-stream", env!("CARGO_PKG_VERSION"))
            .await
            .with_context(|| format!("Failed to initialize tool server '{}'", server.name))?;

        let tools = McpToolProvider::register_all(Arc::new(Mutex::new(client)), &mut registry)
            .await
            .with_context(|| format!("Failed to list tools of '{}'", server.name))?;
        info!("Tool server '{}' provides {} tools", server.name, tools.len());
    }

    Ok(registry)
}
