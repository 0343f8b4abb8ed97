// Server configuration. What the model may call is controlled by YAML, not
// by code.

use advisor_host::ControllerConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::tools::ToolDefinition;

pub const CONFIG_ENV: &str = "ADVISOR_CONFIG";
const CONFIG_FILE: &str = "advisor.yaml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: Option<f32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.1".to_string(),
            timeout_secs: 120,
            temperature: None,
        }
    }
}

/// A stdio tool server whose advertised tools are registered by name.
#[derive(Debug, Clone, Deserialize)]
pub struct McpServerConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdvisorConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Append one JSON transcript per finished conversation here.
    #[serde(default)]
    pub transcript_log: Option<PathBuf>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    #[serde(default)]
    pub mcp_servers: Vec<McpServerConfig>,
}

impl AdvisorConfig {
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading config from: {}", path.display());

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AdvisorConfig =
            serde_yaml::from_str(&content).context("Failed to parse YAML")?;

        // Included files contribute tools and tool servers only.
        for include in std::mem::take(&mut config.include) {
            let include_path = resolve_include_path(path, &include)?;
            info!("Including tools from: {}", include_path.display());

            let included = Box::pin(Self::load_from_file(&include_path)).await?;
            config.tools.extend(included.tools);
            config.mcp_servers.extend(included.mcp_servers);
        }

        Ok(config)
    }

    /// `--config` flag, then `ADVISOR_CONFIG`, then `./advisor.yaml`, then
    /// `~/.config/advisor-stream/advisor.yaml`. Built-in defaults otherwise.
    pub async fn load_with_precedence(config_override: Option<String>) -> Result<Self> {
        if let Some(path) = config_override {
            return Self::load_from_file(Path::new(&path)).await;
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load_from_file(Path::new(&path)).await;
        }

        for candidate in default_locations() {
            if candidate.exists() {
                return Self::load_from_file(&candidate).await;
            }
        }

        info!("No {} found; using built-in defaults", CONFIG_FILE);
        Ok(Self::default())
    }
}

fn default_locations() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(".").join(CONFIG_FILE)];
    if let Some(home) = directories::UserDirs::new() {
        paths.push(
            home.home_dir()
                .join(".config")
                .join("advisor-stream")
                .join(CONFIG_FILE),
        );
    }
    paths
}

fn resolve_include_path(base_path: &Path, include: &str) -> Result<PathBuf> {
    let base_dir = base_path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Cannot determine parent directory"))?;

    let include_path = if let Some(rest) = include.strip_prefix("~/") {
        let home = directories::UserDirs::new()
            .ok_or_else(|| anyhow::anyhow!("Cannot resolve home directory"))?;
        home.home_dir().join(rest)
    } else {
        // Absolute paths replace base_dir on join
        base_dir.join(include)
    };

    if !include_path.exists() {
        anyhow::bail!("Include file not found: {}", include_path.display());
    }

    Ok(include_path)
}
