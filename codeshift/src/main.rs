use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use codeshift::routes::{route, AppState};
use codeshift::utils::tracing::init_tracer;
use common::configuration::Configuration;
use common::consts::{CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use opentelemetry::trace::FutureExt;
use opentelemetry::{global, Context};
use opentelemetry_http::HeaderExtractor;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

// Utility function to extract the context from the incoming request headers
fn extract_context_from_request(req: &Request<Incoming>) -> Context {
    global::get_text_map_propagator(|propagator| {
        propagator.extract(&HeaderExtractor(req.headers()))
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // read config before tracing init so the tracing section is available
    let config_path = PathBuf::from(
        env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string()),
    );
    eprintln!("loading configuration from {}", config_path.display());

    let loaded = Configuration::read(&config_path)?;
    let config_found = loaded.is_some();
    let mut config = loaded.unwrap_or_default();
    config.apply_env_overrides();

    let _tracer_provider = init_tracer(config.tracing.as_ref());
    if !config_found {
        info!(path = %config_path.display(), "no config file found, using defaults");
    }
    info!(
        path = %config_path.display(),
        ollama = %config.ollama.base_url(),
        default_model = %config.ollama.default_model,
        "loaded configuration"
    );

    let state = Arc::new(AppState::from_config(&config));
    let listener = TcpListener::bind(&config.listener.address).await?;
    info!(address = %config.listener.address, "listening");

    loop {
        let (stream, _) = listener.accept().await?;
        let peer_addr = stream.peer_addr()?;
        let io = TokioIo::new(stream);

        let state = Arc::clone(&state);
        let service = service_fn(move |req| {
            let state = Arc::clone(&state);
            let parent_cx = extract_context_from_request(&req);
            async move { route(req, state).with_context(parent_cx).await }
        });

        tokio::task::spawn(async move {
            debug!(peer = ?peer_addr, "accepted connection");
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(error = ?err, "error serving connection");
            }
        });
    }
}
