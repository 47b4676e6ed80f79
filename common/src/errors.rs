use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::{Error as HyperError, Response, StatusCode};
use serde_json::{json, Value};
use thiserror::Error;

// -----------------------------------------------------------------------------
// Conversion service errors
// -----------------------------------------------------------------------------
// Everything here is raised before the first response byte is written, so each
// variant maps to a status code. Failures after streaming has begun travel
// in-band as SSE error events instead.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("inputCode is required")]
    MissingInput,

    #[error("Invalid JSON body: {0}")]
    InvalidBody(String),

    #[error("Model '{0}' not found. Pull it first with: ollama pull {0}")]
    ModelNotFound(String),

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    UpstreamUnavailable(String),

    #[error("{0}")]
    ModelListing(String),

    #[error("Failed to create response: {0}")]
    ResponseCreationFailed(#[from] hyper::http::Error),
}

impl ConvertError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ConvertError::MissingInput | ConvertError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ConvertError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ConvertError::ModelNotFound(_)
            | ConvertError::Upstream(_)
            | ConvertError::ModelListing(_)
            | ConvertError::ResponseCreationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON body the browser client understands for this failure.
    pub fn body(&self) -> Value {
        match self {
            ConvertError::MissingInput => json!({ "error": self.to_string() }),
            ConvertError::InvalidBody(reason) => {
                json!({ "error": "Invalid JSON body", "details": reason })
            }
            ConvertError::ModelNotFound(_) | ConvertError::Upstream(_) => {
                json!({ "error": "Conversion failed", "details": self.to_string() })
            }
            ConvertError::UpstreamUnavailable(message) => json!({
                "status": "error",
                "ollama": "unreachable",
                "message": message
            }),
            ConvertError::ModelListing(reason) => {
                json!({ "error": "Failed to fetch models", "details": reason })
            }
            ConvertError::ResponseCreationFailed(reason) => {
                json!({ "error": "Failed to create response", "details": reason.to_string() })
            }
        }
    }

    pub fn into_response(self) -> Response<BoxBody<Bytes, HyperError>> {
        let status = self.status_code();
        let body_json = self.body();

        // Full never fails, but BoxBody expects a HyperError
        let boxed_body = Full::new(Bytes::from(body_json.to_string()))
            .map_err(|never| match never {})
            .boxed();

        Response::builder()
            .status(status)
            .header("content-type", "application/json")
            .body(boxed_body)
            .unwrap_or_else(|_| {
                Response::new(
                    Full::new(Bytes::from("Internal Error"))
                        .map_err(|never| match never {})
                        .boxed(),
                )
            })
    }
}
