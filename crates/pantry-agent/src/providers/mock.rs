use async_trait::async_trait;
use std::sync::Mutex;

use super::base::{ModelGateway, ModelRequest};
use crate::errors::GatewayError;
use crate::models::response::ModelResponse;

/// A mock gateway that returns pre-configured results for testing
pub struct MockGateway {
    responses: Mutex<Vec<Result<ModelResponse, GatewayError>>>,
    requests: Mutex<Vec<ModelRequest>>,
    fallback: Option<ModelResponse>,
}

impl MockGateway {
    /// Create a new mock gateway with a sequence of results
    pub fn new(responses: Vec<Result<ModelResponse, GatewayError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
            fallback: None,
        }
    }

    /// Keep answering with `response` once the scripted results run out
    pub fn repeating(response: ModelResponse) -> Self {
        Self {
            fallback: Some(response),
            ..Self::new(Vec::new())
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelGateway for MockGateway {
    async fn call(&self, request: &ModelRequest) -> Result<ModelResponse, GatewayError> {
        self.requests.lock().unwrap().push(request.clone());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            // Empty text once the script is exhausted
            Ok(self
                .fallback
                .clone()
                .unwrap_or(ModelResponse::Text { content: None }))
        } else {
            responses.remove(0)
        }
    }
}
