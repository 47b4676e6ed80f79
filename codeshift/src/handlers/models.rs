use bytes::Bytes;
use common::errors::ConvertError;
use http_body_util::combinators::BoxBody;
use hyper::{Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::handlers::response_handler::ResponseHandler;
use crate::upstream::OllamaClient;

pub async fn list_models(client: &OllamaClient) -> Response<BoxBody<Bytes, hyper::Error>> {
    match client.list_models().await {
        Ok(models) => {
            debug!(count = models.len(), "listed installed models");
            ResponseHandler::create_json_response(StatusCode::OK, &Value::Array(models))
        }
        Err(err) => {
            warn!(error = %err, "failed to list models");
            ConvertError::ModelListing(err.to_string()).into_response()
        }
    }
}
