use std::time::Duration;

use common::configuration::OllamaConfig;
use common::errors::ConvertError;
use relaywire::{ApiDefinition, GenerateRequest, GenerateResponse, OllamaApi};
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("inputCode is required")]
    EmptyInput,

    #[error("model '{0}' not found")]
    ModelNotFound(String),

    #[error("Failed to send request: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Failed to parse upstream response: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, UpstreamError>;

impl From<UpstreamError> for ConvertError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::EmptyInput => ConvertError::MissingInput,
            UpstreamError::ModelNotFound(model) => ConvertError::ModelNotFound(model),
            other => ConvertError::Upstream(other.to_string()),
        }
    }
}

/// One code conversion, resolved from the client's request body.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    pub source_code: String,
    pub model: String,
    pub streaming: bool,
}

impl ConversionRequest {
    pub fn validate(&self) -> Result<()> {
        if self.source_code.is_empty() {
            return Err(UpstreamError::EmptyInput);
        }
        Ok(())
    }
}

/// Client for the local model server. Issues exactly one call per operation
/// and never retries.
pub struct OllamaClient {
    base_url: String,
    system_prompt: String,
    health_timeout: Duration,
    models_timeout: Duration,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(config: &OllamaConfig) -> Self {
        OllamaClient {
            base_url: config.base_url().to_string(),
            system_prompt: config.system_prompt().to_string(),
            health_timeout: config.health_timeout(),
            models_timeout: config.models_timeout(),
            // no overall timeout: generation is bounded by the model itself
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, api: OllamaApi) -> String {
        format!("{}{}", self.base_url, api.endpoint())
    }

    fn generate_body(&self, request: &ConversionRequest, stream: bool) -> GenerateRequest {
        GenerateRequest::new(
            request.model.clone(),
            request.source_code.clone(),
            Some(self.system_prompt.clone()),
            stream,
        )
    }

    async fn send_generate(
        &self,
        request: &ConversionRequest,
        stream: bool,
    ) -> Result<reqwest::Response> {
        request.validate()?;

        let body = self.generate_body(request, stream);
        debug!(
            model = %body.model,
            stream = body.stream,
            prompt_bytes = body.prompt.len(),
            "sending generate request"
        );

        let response = self
            .client
            .post(self.url(OllamaApi::Generate))
            .json(&body)
            .send()
            .await?;

        check_status(response, Some(&request.model)).await
    }

    /// Non-streaming generation: the whole payload is buffered and decoded.
    pub async fn generate(&self, request: &ConversionRequest) -> Result<GenerateResponse> {
        let response = self.send_generate(request, false).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Streaming generation: returns the open response whose `bytes_stream()`
    /// yields the raw NDJSON chunks.
    pub async fn generate_stream(&self, request: &ConversionRequest) -> Result<reqwest::Response> {
        self.send_generate(request, true).await
    }

    /// Liveness probe against the server root. Returns its body text.
    pub async fn health(&self) -> Result<String> {
        let response = self
            .client
            .get(self.url(OllamaApi::Root))
            .timeout(self.health_timeout)
            .send()
            .await?;
        let response = check_status(response, None).await?;
        Ok(response.text().await?)
    }

    /// Installed models as reported by the server, empty when it reports none.
    pub async fn list_models(&self) -> Result<Vec<Value>> {
        let response = self
            .client
            .get(self.url(OllamaApi::Tags))
            .timeout(self.models_timeout)
            .send()
            .await?;
        let response = check_status(response, None).await?;
        let body: Value = serde_json::from_slice(&response.bytes().await?)?;

        Ok(match body.get("models") {
            Some(Value::Array(models)) => models.clone(),
            _ => Vec::new(),
        })
    }
}

async fn check_status(response: reqwest::Response, model: Option<&str>) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if let (StatusCode::NOT_FOUND, Some(model)) = (status, model) {
        return Err(UpstreamError::ModelNotFound(model.to_string()));
    }

    let body = response.text().await.unwrap_or_default();
    Err(UpstreamError::Status { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn client_for(server: &mockito::Server) -> OllamaClient {
        let config = OllamaConfig {
            endpoint: format!("{}/", server.url()),
            system_prompt: Some("convert it".to_string()),
            ..Default::default()
        };
        OllamaClient::new(&config)
    }

    fn conversion(source: &str, streaming: bool) -> ConversionRequest {
        ConversionRequest {
            source_code: source.to_string(),
            model: "llama3:8b".to_string(),
            streaming,
        }
    }

    #[tokio::test]
    async fn test_generate_posts_expected_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/generate")
            .match_body(Matcher::Json(json!({
                "model": "llama3:8b",
                "prompt": "x = 1",
                "system": "convert it",
                "stream": false
            })))
            .with_status(200)
            .with_body(r#"{"model":"llama3:8b","response":"let x = 1;","done":true,"total_duration":42}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let response = client.generate(&conversion("x = 1", false)).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.response, "let x = 1;");
        assert_eq!(response.total_duration, Some(42));
    }

    #[tokio::test]
    async fn test_empty_input_never_reaches_upstream() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/generate")
            .expect(0)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.generate(&conversion("", false)).await.unwrap_err();

        assert!(matches!(err, UpstreamError::EmptyInput));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_whitespace_input_reaches_upstream() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/generate")
            .match_body(Matcher::PartialJson(json!({ "prompt": "  \n" })))
            .with_status(200)
            .with_body(r#"{"response":"","done":true}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        client.generate(&conversion("  \n", false)).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_not_found_maps_to_model_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/generate")
            .with_status(404)
            .with_body(r#"{"error":"model \"llama3:8b\" not found, try pulling it first"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client
            .generate_stream(&conversion("x", true))
            .await
            .unwrap_err();

        match err {
            UpstreamError::ModelNotFound(model) => assert_eq!(model, "llama3:8b"),
            other => panic!("expected ModelNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_other_status_keeps_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/generate")
            .with_status(500)
            .with_body("llama runner crashed")
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.generate(&conversion("x", false)).await.unwrap_err();

        match err {
            UpstreamError::Status { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "llama runner crashed");
            }
            other => panic!("expected Status, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_is_request_error() {
        let config = OllamaConfig {
            endpoint: "http://127.0.0.1:1".to_string(),
            ..Default::default()
        };
        let client = OllamaClient::new(&config);

        let err = client.health().await.unwrap_err();
        assert!(matches!(err, UpstreamError::Request(_)));
        assert!(matches!(ConvertError::from(err), ConvertError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_health_returns_root_text() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/")
            .with_status(200)
            .with_body("Ollama is running")
            .create_async()
            .await;

        let client = client_for(&server);
        assert_eq!(client.health().await.unwrap(), "Ollama is running");
    }

    #[tokio::test]
    async fn test_list_models_handles_missing_array() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/tags")
            .with_status(200)
            .with_body(r#"{"models":[{"name":"llama3:8b"},{"name":"qwen2.5-coder:7b"}]}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let models = client.list_models().await.unwrap();
        mock.assert_async().await;
        assert_eq!(models.len(), 2);
        assert_eq!(models[1]["name"], "qwen2.5-coder:7b");

        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/tags")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        let client = client_for(&server);
        assert!(client.list_models().await.unwrap().is_empty());
    }

    #[test]
    fn test_error_conversion() {
        assert!(matches!(
            ConvertError::from(UpstreamError::EmptyInput),
            ConvertError::MissingInput
        ));
        let err = ConvertError::from(UpstreamError::ModelNotFound("ghost:latest".to_string()));
        assert!(err.to_string().contains("Model 'ghost:latest' not found."));
    }
}
