use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No image provided")]
    MissingImage,

    #[error("Unsupported file extension. Only .jpg, .jpeg, and .png are supported. Got: {0}")]
    UnsupportedExtension(String),

    #[error("Unsupported content type. Only image/jpeg and image/png are supported. Got: {0}")]
    UnsupportedContentType(String),

    #[error("Invalid {0} value")]
    InvalidParam(&'static str),

    #[error("Malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Failed to process image: {0}")]
    Decode(String),

    #[error("Failed to encode result: {0}")]
    Encode(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingImage
            | ApiError::UnsupportedExtension(_)
            | ApiError::UnsupportedContentType(_)
            | ApiError::InvalidParam(_)
            | ApiError::Decode(_) => StatusCode::BAD_REQUEST,
            ApiError::Multipart(e) => e.status(),
            ApiError::Encode(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}
