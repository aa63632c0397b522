use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::base::{ModelGateway, ModelRequest};
use crate::config::GatewaySettings;
use crate::errors::GatewayError;
use crate::models::response::ModelResponse;

/// Single-attempt gateway over HTTP. Wrap it in a `RetryingGateway` for retries.
pub struct HttpGateway {
    client: Client,
    settings: GatewaySettings,
}

impl HttpGateway {
    pub fn new(settings: GatewaySettings) -> Result<Self> {
        let client = Client::builder().timeout(settings.timeout()).build()?;
        Ok(Self { client, settings })
    }

    async fn post(&self, request: &ModelRequest) -> Result<Value, GatewayError> {
        let mut builder = self.client.post(self.settings.endpoint()).json(request);
        if let Some(api_key) = &self.settings.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!("Completion endpoint returned {}", status);
            return Err(GatewayError::status(status.as_u16()));
        }

        response.json().await.map_err(classify)
    }
}

#[async_trait]
impl ModelGateway for HttpGateway {
    async fn call(&self, request: &ModelRequest) -> Result<ModelResponse, GatewayError> {
        let body = self.post(request).await?;
        ModelResponse::from_wire(&body)
    }
}

fn classify(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::timeout()
    } else if let Some(status) = err.status() {
        GatewayError::status(status.as_u16())
    } else {
        tracing::debug!("Completion request failed: {}", err);
        GatewayError::network("The assistant service could not be reached.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ModelRequest {
        ModelRequest {
            system: "You manage a pantry.".to_string(),
            messages: vec![json!({"role": "user", "content": "add milk"})],
            tools: vec![],
            context: None,
        }
    }

    async fn setup_mock_server(template: ResponseTemplate) -> (MockServer, HttpGateway) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/agent/complete"))
            .respond_with(template)
            .mount(&mock_server)
            .await;

        let mut settings = GatewaySettings::new(mock_server.uri());
        settings.timeout_ms = 200;
        let gateway = HttpGateway::new(settings).unwrap();
        (mock_server, gateway)
    }

    #[tokio::test]
    async fn test_text_response() -> Result<()> {
        let (_server, gateway) =
            setup_mock_server(ResponseTemplate::new(200).set_body_json(json!({"content": "Hi!"})))
                .await;

        let response = gateway.call(&request()).await?;
        assert_eq!(response, ModelResponse::text("Hi!"));
        Ok(())
    }

    #[tokio::test]
    async fn test_status_is_reported() {
        let (_server, gateway) = setup_mock_server(ResponseTemplate::new(503)).await;
        let err = gateway.call(&request()).await.unwrap_err();
        assert_eq!(err.status, Some(503));
        assert!(err.is_transient());

        let (_server, gateway) = setup_mock_server(ResponseTemplate::new(400)).await;
        let err = gateway.call(&request()).await.unwrap_err();
        assert_eq!(err.status, Some(400));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let (_server, gateway) = setup_mock_server(
            ResponseTemplate::new(200)
                .set_body_json(json!({"content": "late"}))
                .set_delay(Duration::from_millis(1000)),
        )
        .await;

        let err = gateway.call(&request()).await.unwrap_err();
        assert!(err.timeout);
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_error_body_is_rejected() {
        let (_server, gateway) = setup_mock_server(
            ResponseTemplate::new(200).set_body_json(json!({"error": "model overloaded"})),
        )
        .await;

        let err = gateway.call(&request()).await.unwrap_err();
        assert_eq!(err.status, None);
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_sends_bearer_token_and_payload() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/agent/complete"))
            .and(header("authorization", "Bearer test_api_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": "ok"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut settings = GatewaySettings::new(mock_server.uri());
        settings.api_key = Some("test_api_key".to_string());
        let gateway = HttpGateway::new(settings)?;

        gateway.call(&request()).await?;

        let received = mock_server.received_requests().await.unwrap_or_default();
        let body: Value = serde_json::from_slice(&received[0].body)?;
        assert_eq!(body["system"], "You manage a pantry.");
        assert_eq!(body["messages"][0]["content"], "add milk");
        Ok(())
    }
}
