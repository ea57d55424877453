use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::multipart::DecodeError;
use crate::upload::UploadError;

pub const PLAIN_TEXT_UTF8: &str = "text/plain; charset=UTF-8";

/// every way a request can fail, each mapped to exactly one response
#[derive(Error, Debug)]
pub enum AppError {
    #[error("file query param not found")]
    MissingFileParam,
    #[error("Failure: 404 Not Found\r\n")]
    NotFound,
    #[error("Failure: 403 Forbidden\r\n")]
    Forbidden,
    #[error("Failure: 405 Method Not Allowed\r\n")]
    MethodNotAllowed,
    #[error("Not a multipart request")]
    NotMultipart,
    #[error("Failed to decode file data")]
    Decode(#[source] DecodeError),
    #[error("Unknown error occurred")]
    IncompletePart,
    #[error("No file provided")]
    NoFilePart,
    #[error("Unexpected error occurred")]
    Persist(#[source] UploadError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<DecodeError> for AppError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::NotMultipart | DecodeError::MissingBoundary => AppError::NotMultipart,
            DecodeError::IncompletePart(name) => {
                tracing::warn!("Part {:?} ended before its boundary", name);
                AppError::IncompletePart
            }
            other => AppError::Decode(other),
        }
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        AppError::Persist(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Decode(source) => tracing::warn!("Rejecting upload: {}", source),
            AppError::Persist(source) => tracing::error!("Failed to persist upload: {}", source),
            other => tracing::debug!("Responding {} ({})", status, other.to_string().trim_end()),
        }

        // the connection is closed as soon as the error is sent
        let mut response = (
            status,
            [
                (header::CONTENT_TYPE, PLAIN_TEXT_UTF8),
                (header::CONNECTION, "close"),
            ],
            self.to_string(),
        )
            .into_response();

        if status == StatusCode::METHOD_NOT_ALLOWED {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("GET, POST"));
        }
        response
    }
}
