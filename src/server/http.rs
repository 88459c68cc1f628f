//! Static HTTP fallback
//!
//! Plain GETs arriving on the listening socket are served from the
//! configured document root. The upload and offline-recording pages are
//! shadowed with a stub pointing at the streaming UI, which is the only
//! one this server speaks.

use std::path::{Component, Path, PathBuf};

use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use tracing::debug;

const REDIRECT_STUB: &str = r#"<!doctype html><html><head>
<title>Streaming speech recognition</title><body>
<h2>Only /streaming_record.html is available for the streaming server.</h2>
<br/>
<br/>
Go back to <a href="/streaming_record.html">/streaming_record.html</a>
</body></head></html>
"#;

const NOT_FOUND_BODY: &str = "404 Not Found";

pub(crate) async fn serve_static(doc_root: &Path, uri: &Uri) -> Response {
    let path = uri.path();
    let path = if path == "/" { "/index.html" } else { path };

    if path == "/upload.html" || path == "/offline_record.html" {
        return response(StatusCode::OK, "text/html; charset=utf-8", REDIRECT_STUB.into());
    }

    let Some(relative) = sanitize(path) else {
        debug!("Rejecting request for {}", path);
        return response(StatusCode::NOT_FOUND, "text/plain", NOT_FOUND_BODY.into());
    };

    let full = doc_root.join(relative);
    match tokio::fs::read(&full).await {
        Ok(body) => response(StatusCode::OK, content_type(&full), body),
        Err(_) => {
            debug!("No such file: {}", full.display());
            response(StatusCode::NOT_FOUND, "text/plain", NOT_FOUND_BODY.into())
        }
    }
}

fn response(status: StatusCode, content_type: &'static str, body: Vec<u8>) -> Response {
    (status, [(header::CONTENT_TYPE, content_type)], body).into_response()
}

/// Strip the leading slash and refuse anything that could escape the
/// document root.
fn sanitize(path: &str) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for component in Path::new(path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(clean)
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("js") => "application/javascript",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("wav") => "audio/wav",
        Some("png") => "image/png",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}
