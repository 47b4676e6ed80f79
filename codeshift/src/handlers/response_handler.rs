use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::header::{self, HeaderValue};
use hyper::{Response, StatusCode};

/// Helpers for building the HTTP responses the service sends
pub struct ResponseHandler;

impl ResponseHandler {
    /// Create a full response body from bytes
    pub fn create_full_body<T: Into<Bytes>>(chunk: T) -> BoxBody<Bytes, hyper::Error> {
        Full::new(chunk.into())
            .map_err(|never| match never {})
            .boxed()
    }

    pub fn empty() -> BoxBody<Bytes, hyper::Error> {
        Empty::<Bytes>::new()
            .map_err(|never| match never {})
            .boxed()
    }

    /// Create a JSON response with the given status
    pub fn create_json_response(
        status: StatusCode,
        body: &serde_json::Value,
    ) -> Response<BoxBody<Bytes, hyper::Error>> {
        let mut response = Response::new(Self::create_full_body(body.to_string()));
        *response.status_mut() = status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response
    }

    pub fn create_not_found() -> Response<BoxBody<Bytes, hyper::Error>> {
        let mut not_found = Response::new(Self::empty());
        *not_found.status_mut() = StatusCode::NOT_FOUND;
        not_found
    }

    /// Answer a CORS preflight for the API routes
    pub fn create_preflight_response() -> Response<BoxBody<Bytes, hyper::Error>> {
        let mut response = Response::new(Self::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        let headers = response.headers_mut();
        headers.insert(header::ALLOW, HeaderValue::from_static("GET, POST, OPTIONS"));
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, OPTIONS"),
        );
        response
    }

    /// Wrap a streaming body as a Server-Sent-Events response.
    ///
    /// Headers disable caching and proxy buffering so frames reach the
    /// browser as soon as they are written.
    pub fn create_sse_response(
        body: BoxBody<Bytes, hyper::Error>,
    ) -> Result<Response<BoxBody<Bytes, hyper::Error>>, hyper::http::Error> {
        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::CONNECTION, "keep-alive")
            .header("x-accel-buffering", "no")
            .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
            .body(body)
    }
}
