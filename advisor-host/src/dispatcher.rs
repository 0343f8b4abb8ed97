// Tool dispatcher - resolves tool names through the provider registry and
// normalizes every result, error or panic into a ToolOutcome.
// Nothing a provider does can escape this boundary and end the turn.

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::message::{ToolCall, ToolOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderOutput {
    pub text: String,
}

impl ProviderOutput {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// An external capability reachable by tool name (search, geocoding,
/// data-set lookup, ...). Retry and timeout policy belong here, not in the
/// dispatcher.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    async fn invoke(&self, parameters: Map<String, Value>) -> anyhow::Result<ProviderOutput>;

    fn description(&self) -> &str {
        ""
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("unknown tool")]
    UnknownTool,
    #[error("{0}")]
    Failed(String),
    #[error("provider panicked: {0}")]
    Panicked(String),
}

/// Static name -> provider table. Several names may share one provider.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn CapabilityProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P>(&mut self, name: impl Into<String>, provider: P)
    where
        P: CapabilityProvider + 'static,
    {
        self.register_shared(name, Arc::new(provider));
    }

    pub fn register_shared(
        &mut self,
        name: impl Into<String>,
        provider: Arc<dyn CapabilityProvider>,
    ) {
        let name = name.into();
        if self.providers.insert(name.clone(), provider).is_some() {
            warn!("Provider for tool '{}' replaced", name);
        } else {
            info!("Registered tool: {}", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CapabilityProvider>> {
        self.providers.get(name).cloned()
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<ProviderRegistry>,
}

impl ToolDispatcher {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Invoke the provider for `call` exactly once.
    pub async fn dispatch(&self, call: ToolCall) -> ToolOutcome {
        let start = Instant::now();
        let result = self.invoke(&call).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(output) => {
                info!("Tool '{}' succeeded in {}ms", call.name, elapsed_ms);
                ToolOutcome::success(call, output.text)
            }
            Err(e) => {
                warn!("Tool '{}' failed in {}ms: {}", call.name, elapsed_ms, e);
                ToolOutcome::failure(call, e.to_string())
            }
        }
    }

    async fn invoke(&self, call: &ToolCall) -> Result<ProviderOutput, ProviderError> {
        let provider = self
            .registry
            .get(&call.name)
            .ok_or(ProviderError::UnknownTool)?;

        debug!("Invoking '{}' with {:?}", call.name, call.parameters);

        match AssertUnwindSafe(provider.invoke(call.parameters.clone()))
            .catch_unwind()
            .await
        {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(ProviderError::Failed(format!("{:#}", e))),
            Err(panic) => Err(ProviderError::Panicked(panic_message(panic.as_ref()))),
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
