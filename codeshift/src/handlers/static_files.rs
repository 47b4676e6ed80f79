use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::header::{self, HeaderValue};
use hyper::Response;
use tracing::{debug, warn};

use crate::handlers::response_handler::ResponseHandler;

const INDEX_FILE: &str = "index.html";

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("js") | Some("mjs") => "text/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("json") | Some("map") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("ico") => "image/x-icon",
        Some("woff2") => "font/woff2",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// Maps a request path onto `root`. Returns `None` for anything that would
/// escape it.
fn resolve(root: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = Path::new(request_path.trim_start_matches('/'));
    let mut resolved = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(resolved)
}

async fn read_file(path: &Path) -> Option<Bytes> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => tokio::fs::read(path).await.ok().map(Bytes::from),
        _ => None,
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}

fn file_response(path: &Path, contents: Bytes) -> Response<BoxBody<Bytes, hyper::Error>> {
    let mut response = Response::new(ResponseHandler::create_full_body(contents));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type(path)),
    );
    response
}

/// Serves the browser client. Unknown paths fall back to `index.html` so
/// client-side routes resolve.
pub async fn serve_static(
    root: Option<&Path>,
    request_path: &str,
) -> Response<BoxBody<Bytes, hyper::Error>> {
    let Some(root) = root else {
        debug!(path = %request_path, "no static directory configured");
        return ResponseHandler::create_not_found();
    };

    let Some(mut path) = resolve(root, request_path) else {
        warn!(path = %request_path, "rejecting static path outside the static directory");
        return ResponseHandler::create_not_found();
    };

    if is_dir(&path).await {
        path.push(INDEX_FILE);
    }

    if let Some(contents) = read_file(&path).await {
        return file_response(&path, contents);
    }

    let index = root.join(INDEX_FILE);
    match read_file(&index).await {
        Some(contents) => file_response(&index, contents),
        None => ResponseHandler::create_not_found(),
    }
}
