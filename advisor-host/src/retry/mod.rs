use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::dispatcher::{CapabilityProvider, ProviderOutput};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryStrategy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 250,
        }
    }
}

impl RetryStrategy {
    pub fn new(max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
        }
    }

    pub async fn execute_with_retry<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            match operation(attempt).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    tracing::warn!("Attempt {} failed: {:#}", attempt + 1, e);

                    last_error = Some(e);

                    if attempt < self.max_retries {
                        let delay = self.calculate_delay(attempt);
                        sleep(Duration::from_millis(delay)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("All retry attempts failed")))
    }

    fn calculate_delay(&self, attempt: u32) -> u64 {
        // Exponential backoff with jitter
        let exponential_delay = self.base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
        let jitter = (rand::random::<f64>() * 0.3 * exponential_delay as f64) as u64;
        exponential_delay + jitter
    }
}

/// Provider decorator that retries failed invocations.
pub struct RetryingProvider<P> {
    inner: P,
    strategy: RetryStrategy,
}

impl<P: CapabilityProvider> RetryingProvider<P> {
    pub fn new(inner: P, strategy: RetryStrategy) -> Self {
        Self { inner, strategy }
    }
}

#[async_trait]
impl<P: CapabilityProvider> CapabilityProvider for RetryingProvider<P> {
    async fn invoke(&self, parameters: Map<String, Value>) -> Result<ProviderOutput> {
        self.strategy
            .execute_with_retry(|_| self.inner.invoke(parameters.clone()))
            .await
    }

    fn description(&self) -> &str {
        self.inner.description()
    }
}
