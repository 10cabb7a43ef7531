use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart},
    http::{Method, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::Config;
use crate::decode;
use crate::error::ApiError;
use crate::params::DitherParams;
use crate::pipeline;
use crate::ui;

/// The `image` part of a dither request.
struct Upload {
    filename: String,
    content_type: String,
    data: Bytes,
}

async fn log_error_responses(req: axum::extract::Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();
    let res = next.run(req).await;
    let status = res.status();
    if status.is_server_error() {
        tracing::error!(%method, %uri, %status, elapsed_ms = start.elapsed().as_millis(), "http 5xx");
    } else if status.is_client_error() {
        tracing::warn!(%method, %uri, %status, elapsed_ms = start.elapsed().as_millis(), "http 4xx");
    }
    res
}

pub fn router(cfg: &Config) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::HEAD,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
        ])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::ACCEPT]);

    let trace = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO))
        .on_failure(DefaultOnFailure::new().level(Level::ERROR));

    let app = Router::new().route(
        "/dither",
        post(dither_upload).layer(DefaultBodyLimit::max(cfg.max_upload_bytes())),
    );

    #[cfg(feature = "embed_ui")]
    let app = app
        .route("/", axum::routing::get(ui::serve_ui))
        .route("/{*path}", axum::routing::get(ui::serve_ui));

    #[cfg(not(feature = "embed_ui"))]
    let app = app.fallback_service(ui::serve_dir(cfg.static_dir()));

    app.layer(cors)
        .layer(trace)
        .layer(middleware::from_fn(log_error_responses))
}

/// Dither an uploaded image and return it as a PNG attachment.
pub async fn dither_upload(mut multipart: Multipart) -> Result<Response, ApiError> {
    let mut upload: Option<Upload> = None;
    let mut fields: HashMap<String, String> = HashMap::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(|s| s.to_string()) else {
            continue;
        };
        if name == "image" {
            let filename = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().unwrap_or_default().to_string();
            let data = field.bytes().await?;
            upload = Some(Upload {
                filename,
                content_type,
                data,
            });
        } else {
            let text = field.text().await?;
            fields.insert(name, text);
        }
    }

    let upload = upload.ok_or(ApiError::MissingImage)?;
    decode::validate_upload(&upload.filename, &upload.content_type)?;
    let params = DitherParams::from_fields(&fields)?;
    let ext = decode::extension_of(&upload.filename);
    tracing::info!(
        filename = %upload.filename,
        bytes = upload.data.len(),
        algorithm = params.algorithm.name(),
        scale = params.scale,
        invert = params.invert,
        "dither request"
    );

    let data = upload.data;
    let png = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, ApiError> {
        let img = decode::decode_upload(&data).map_err(|e| ApiError::Decode(format!("{e:#}")))?;
        let out = pipeline::process(&img, &params);
        decode::encode_png(&out).map_err(|e| ApiError::Encode(format!("{e:#}")))
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok((
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=dithered{ext}.png"),
            ),
        ],
        png,
    )
        .into_response())
}

pub async fn serve(app: Router, bind: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = bind.parse()?;
    tracing::info!(addr=%addr, "starting http server");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
