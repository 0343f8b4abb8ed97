use advisor_host::{CapabilityProvider, ProviderOutput};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Answers with a fixed payload after a delay and counts its calls.
pub struct DelayedProvider {
    payload: String,
    delay: Duration,
    pub calls: Arc<AtomicUsize>,
}

impl DelayedProvider {
    pub fn new(payload: &str, delay_ms: u64) -> Self {
        Self {
            payload: payload.to_string(),
            delay: Duration::from_millis(delay_ms),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn instant(payload: &str) -> Self {
        Self::new(payload, 0)
    }
}

#[async_trait]
impl CapabilityProvider for DelayedProvider {
    async fn invoke(&self, _parameters: Map<String, Value>) -> Result<ProviderOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(ProviderOutput::new(self.payload.as_str()))
    }
}

pub struct FailingProvider {
    message: String,
}

impl FailingProvider {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl CapabilityProvider for FailingProvider {
    async fn invoke(&self, _parameters: Map<String, Value>) -> Result<ProviderOutput> {
        anyhow::bail!("{}", self.message)
    }
}

pub struct PanickingProvider;

#[async_trait]
impl CapabilityProvider for PanickingProvider {
    async fn invoke(&self, _parameters: Map<String, Value>) -> Result<ProviderOutput> {
        panic!("index out of range")
    }
}

/// Signals when it starts and then never finishes on its own.
pub struct GatedProvider {
    pub started: Arc<Notify>,
    pub finished: Arc<AtomicUsize>,
}

impl GatedProvider {
    pub fn new() -> Self {
        Self {
            started: Arc::new(Notify::new()),
            finished: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl CapabilityProvider for GatedProvider {
    async fn invoke(&self, _parameters: Map<String, Value>) -> Result<ProviderOutput> {
        self.started.notify_one();
        tokio::time::sleep(Duration::from_secs(3600)).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(ProviderOutput::new("too late"))
    }
}
