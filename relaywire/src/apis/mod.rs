pub mod ollama;

pub use ollama::{GenerateRequest, GenerateResponse, OllamaApi, UpstreamRecord};

pub trait ApiDefinition {
    /// Returns the endpoint path for this API
    fn endpoint(&self) -> &'static str;
}
