//! Web UI serving.
//! With the `embed_ui` feature the `static/` directory is compiled into the
//! binary; otherwise it is read from the configured directory at runtime.

#[cfg(feature = "embed_ui")]
use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};

#[cfg(feature = "embed_ui")]
use rust_embed::RustEmbed;

#[cfg(not(feature = "embed_ui"))]
use tower_http::services::ServeDir;

#[cfg(feature = "embed_ui")]
#[derive(RustEmbed)]
#[folder = "../static"]
struct UiAssets;

#[cfg(feature = "embed_ui")]
fn respond(path: &str) -> Option<Response> {
    UiAssets::get(path).map(|file| {
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        let cache = if path.ends_with(".html") {
            "no-cache"
        } else {
            "public, max-age=86400"
        };
        let mut resp = Response::new(Body::from(file.data.into_owned()));
        let headers = resp.headers_mut();
        if let Ok(ct) = HeaderValue::from_str(mime.as_ref()) {
            headers.insert(header::CONTENT_TYPE, ct);
        }
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(cache));
        resp
    })
}

#[cfg(feature = "embed_ui")]
/// Serve embedded assets. `/` maps to `index.html`; `/about` also tries
/// `about/index.html` and `about.html`.
pub async fn serve_ui(uri: Uri) -> Response {
    let raw_path = uri.path().trim_start_matches('/');
    if raw_path.is_empty() {
        if let Some(resp) = respond("index.html") {
            return resp;
        }
    } else {
        let candidates = [
            raw_path.to_string(),
            format!("{raw_path}/index.html"),
            format!("{raw_path}.html"),
        ];
        for cand in &candidates {
            if let Some(resp) = respond(cand) {
                return resp;
            }
        }
    }
    tracing::debug!(path = %uri.path(), "ui asset not found");
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

#[cfg(not(feature = "embed_ui"))]
/// Static file service rooted at `dir`, serving `index.html` for directories.
pub fn serve_dir(dir: impl AsRef<std::path::Path>) -> ServeDir {
    ServeDir::new(dir).append_index_html_on_directories(true)
}
