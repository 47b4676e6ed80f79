use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use common::configuration::Configuration;
use common::consts::{CONVERT_PATH, HEALTH_PATH, MODELS_PATH};
use http_body_util::combinators::BoxBody;
use hyper::body::Body;
use hyper::{Method, Request, Response};
use tracing::debug;

use crate::handlers::convert::convert;
use crate::handlers::health::health;
use crate::handlers::models::list_models;
use crate::handlers::response_handler::ResponseHandler;
use crate::handlers::static_files::serve_static;
use crate::upstream::OllamaClient;

/// Shared, read-only state handed to every request.
pub struct AppState {
    pub client: OllamaClient,
    pub default_model: String,
    pub static_dir: Option<PathBuf>,
}

impl AppState {
    pub fn from_config(config: &Configuration) -> Self {
        AppState {
            client: OllamaClient::new(&config.ollama),
            default_model: config.ollama.default_model.clone(),
            static_dir: config.static_dir.clone(),
        }
    }
}

pub async fn route<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody<Bytes, hyper::Error>>, hyper::Error>
where
    B: Body<Data = Bytes, Error = hyper::Error>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match (&method, path.as_str()) {
        (&Method::GET, HEALTH_PATH) => Ok(health(&state.client).await),
        (&Method::GET, MODELS_PATH) => Ok(list_models(&state.client).await),
        (&Method::POST, CONVERT_PATH) => convert(req, state).await,
        (&Method::OPTIONS, HEALTH_PATH | MODELS_PATH | CONVERT_PATH) => {
            Ok(ResponseHandler::create_preflight_response())
        }
        (&Method::GET, _) if !path.starts_with("/api/") => {
            Ok(serve_static(state.static_dir.as_deref(), &path).await)
        }
        _ => {
            debug!(method = %method, path = %path, "no route found");
            Ok(ResponseHandler::create_not_found())
        }
    }
}
