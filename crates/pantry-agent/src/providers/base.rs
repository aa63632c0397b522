use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::errors::GatewayError;
use crate::models::response::ModelResponse;

/// Body of a completion request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRequest {
    pub system: String,
    pub messages: Vec<Value>,
    pub tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

/// Sends a conversation plus tool catalog to a completion endpoint
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn call(&self, request: &ModelRequest) -> Result<ModelResponse, GatewayError>;
}

#[async_trait]
impl<G: ModelGateway + ?Sized> ModelGateway for Arc<G> {
    async fn call(&self, request: &ModelRequest) -> Result<ModelResponse, GatewayError> {
        (**self).call(request).await
    }
}
