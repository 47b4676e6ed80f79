use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use common::consts::REQUEST_ID_HEADER;
use common::errors::ConvertError;
use http_body_util::combinators::BoxBody;
use http_body_util::BodyExt;
use hyper::body::Body;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::handlers::conversion_stream::ConversionStreamProcessor;
use crate::handlers::response_handler::ResponseHandler;
use crate::handlers::utils::{create_streaming_response, truncate_message};
use crate::routes::AppState;
use crate::upstream::{ConversionRequest, OllamaClient};

/// Frames buffered between the relay task and a slow client
const SSE_CHANNEL_CAPACITY: usize = 16;

/// Body of `POST /api/convert` as sent by the browser
#[derive(Debug, Default, Deserialize)]
pub struct ConvertRequestBody {
    #[serde(rename = "inputCode")]
    pub input_code: Option<String>,
    pub model: Option<String>,
    pub stream: Option<bool>,
}

impl ConvertRequestBody {
    pub fn into_conversion(self, default_model: &str) -> Result<ConversionRequest, ConvertError> {
        let source_code = self
            .input_code
            .filter(|code| !code.is_empty())
            .ok_or(ConvertError::MissingInput)?;

        let model = self
            .model
            .filter(|model| !model.trim().is_empty())
            .unwrap_or_else(|| default_model.to_string());

        Ok(ConversionRequest {
            source_code,
            model,
            streaming: self.stream.unwrap_or(true),
        })
    }
}

pub async fn convert<B>(
    request: Request<B>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody<Bytes, hyper::Error>>, hyper::Error>
where
    B: Body<Data = Bytes, Error = hyper::Error>,
{
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let body_bytes = request.collect().await?.to_bytes();

    let body: ConvertRequestBody = match serde_json::from_slice(&body_bytes) {
        Ok(body) => body,
        Err(err) => {
            warn!(request_id = %request_id, error = %err, "rejecting unparseable convert body");
            return Ok(ConvertError::InvalidBody(err.to_string()).into_response());
        }
    };

    let conversion = match body.into_conversion(&state.default_model) {
        Ok(conversion) => conversion,
        Err(err) => {
            debug!(request_id = %request_id, "rejecting convert request: {}", err);
            return Ok(err.into_response());
        }
    };

    let span = info_span!(
        "convert",
        request_id = %request_id,
        llm.model = %conversion.model,
        llm.is_streaming = conversion.streaming
    );

    async move {
        debug!(
            input_preview = %truncate_message(&conversion.source_code, 50),
            input_bytes = conversion.source_code.len(),
            "received conversion request"
        );

        let response = if conversion.streaming {
            stream_conversion(&state.client, &conversion, &request_id).await
        } else {
            buffered_conversion(&state.client, &conversion).await
        };
        Ok::<_, hyper::Error>(response)
    }
    .instrument(span)
    .await
}

async fn stream_conversion(
    client: &OllamaClient,
    conversion: &ConversionRequest,
    request_id: &str,
) -> Response<BoxBody<Bytes, hyper::Error>> {
    let upstream = match client.generate_stream(conversion).await {
        Ok(upstream) => upstream,
        Err(err) => {
            // nothing has been written yet, so the status code can still say it
            warn!(error = %err, "upstream generate call failed");
            return ConvertError::from(err).into_response();
        }
    };

    let processor = ConversionStreamProcessor::new(request_id, conversion.model.clone());
    let streaming_response =
        create_streaming_response(upstream.bytes_stream(), processor, SSE_CHANNEL_CAPACITY);

    match ResponseHandler::create_sse_response(streaming_response.body) {
        Ok(response) => response,
        Err(err) => {
            warn!(error = %err, "failed to build event stream response");
            streaming_response.processor_handle.abort();
            ConvertError::from(err).into_response()
        }
    }
}

async fn buffered_conversion(
    client: &OllamaClient,
    conversion: &ConversionRequest,
) -> Response<BoxBody<Bytes, hyper::Error>> {
    let start_time = Instant::now();

    match client.generate(conversion).await {
        Ok(generated) => {
            let duration = generated
                .total_duration
                .unwrap_or_else(|| start_time.elapsed().as_nanos() as u64);
            let model = generated
                .model
                .unwrap_or_else(|| conversion.model.clone());

            info!(
                duration_ms = start_time.elapsed().as_millis() as u64,
                result_bytes = generated.response.len(),
                "conversion completed"
            );

            ResponseHandler::create_json_response(
                StatusCode::OK,
                &json!({
                    "result": generated.response,
                    "meta": { "duration": duration, "model": model }
                }),
            )
        }
        Err(err) => {
            warn!(error = %err, "conversion failed");
            ConvertError::from(err).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_body_defaults() {
        let body: ConvertRequestBody = serde_json::from_str(r#"{"inputCode":"x = 1"}"#).unwrap();
        let conversion = body.into_conversion("llama3").unwrap();

        assert_eq!(
            conversion,
            ConversionRequest {
                source_code: "x = 1".to_string(),
                model: "llama3".to_string(),
                streaming: true,
            }
        );
    }

    #[test]
    fn test_body_explicit_fields() {
        let body: ConvertRequestBody =
            serde_json::from_str(r#"{"inputCode":"x","model":"codellama","stream":false}"#)
                .unwrap();
        let conversion = body.into_conversion("llama3").unwrap();

        assert_eq!(conversion.model, "codellama");
        assert!(!conversion.streaming);
    }

    #[test]
    fn test_blank_model_falls_back_to_default() {
        let body: ConvertRequestBody =
            serde_json::from_str(r#"{"inputCode":"x","model":"  "}"#).unwrap();
        assert_eq!(body.into_conversion("llama3").unwrap().model, "llama3");
    }

    #[test]
    fn test_whitespace_input_is_forwarded() {
        let body: ConvertRequestBody = serde_json::from_str(r#"{"inputCode":"  \n"}"#).unwrap();
        assert_eq!(body.into_conversion("llama3").unwrap().source_code, "  \n");
    }

    #[test]
    fn test_missing_or_empty_input_rejected() {
        for raw in [r#"{}"#, r#"{"inputCode":""}"#, r#"{"inputCode":null,"stream":true}"#] {
            let body: ConvertRequestBody = serde_json::from_str(raw).unwrap();
            assert!(matches!(
                body.into_conversion("llama3"),
                Err(ConvertError::MissingInput)
            ));
        }
    }
}
