// advisor-stream server: YAML-configured tools, an Ollama token source and
// a stdio runner around the advisor-host turn controller.

pub mod config;
pub mod runner;
pub mod tools;
pub mod transcript_log;
pub mod validation;

pub use config::{AdvisorConfig, McpServerConfig, ModelConfig};
pub use runner::{ChatRequest, Runner};
pub use tools::{build_registry, ArgDefinition, CommandProvider, ToolDefinition};
pub use transcript_log::JsonlTranscriptSink;
