use bytes::Bytes;
use common::errors::ConvertError;
use http_body_util::combinators::BoxBody;
use hyper::{Response, StatusCode};
use serde_json::json;
use tracing::warn;

use crate::handlers::response_handler::ResponseHandler;
use crate::upstream::OllamaClient;

pub async fn health(client: &OllamaClient) -> Response<BoxBody<Bytes, hyper::Error>> {
    match client.health().await {
        Ok(data) => ResponseHandler::create_json_response(
            StatusCode::OK,
            &json!({ "status": "ok", "ollama": "connected", "data": data }),
        ),
        Err(err) => {
            warn!(endpoint = %client.base_url(), error = %err, "model server health probe failed");
            ConvertError::UpstreamUnavailable(err.to_string()).into_response()
        }
    }
}
