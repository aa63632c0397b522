use std::time::Duration;

use async_trait::async_trait;

use super::base::{ModelGateway, ModelRequest};
use crate::config::GatewaySettings;
use crate::errors::GatewayError;
use crate::models::response::ModelResponse;

/// Retries transient gateway failures with a linear delay (`attempt * base_delay`)
pub struct RetryingGateway<G> {
    inner: G,
    max_retries: u32,
    base_delay: Duration,
}

impl<G: ModelGateway> RetryingGateway<G> {
    pub fn new(inner: G, max_retries: u32, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
        }
    }

    pub fn from_settings(inner: G, settings: &GatewaySettings) -> Self {
        Self::new(inner, settings.max_retries, settings.retry_base_delay())
    }
}

#[async_trait]
impl<G: ModelGateway> ModelGateway for RetryingGateway<G> {
    async fn call(&self, request: &ModelRequest) -> Result<ModelResponse, GatewayError> {
        let mut attempt = 0;
        loop {
            match self.inner.call(request).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.base_delay * attempt;
                    tracing::warn!(
                        "Transient gateway failure ({}), retry {}/{} in {:?}",
                        err,
                        attempt,
                        self.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
