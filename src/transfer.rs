use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncReadExt;
use tokio_util::io::ReaderStream;

use crate::error::AppError;
use crate::mime::FALLBACK_CONTENT_TYPE;
use crate::state::AppState;

/// stream `file_name` (relative to the parent directory) as the response body
pub async fn serve(state: &AppState, file_name: &str, keep_alive: bool) -> Result<Response, AppError> {
    let path = resolve_target(&state.config.path_parent, file_name).await?;

    let file = File::open(&path).await.map_err(|e| {
        tracing::warn!("Failed to open {:?}: {}", path, e);
        AppError::NotFound
    })?;

    let length = match file.metadata().await {
        Ok(metadata) => metadata.len(),
        Err(e) => {
            tracing::error!("Failed to read length of {:?}: {}", path, e);
            0
        }
    };

    let content_type = state.content_types.resolve(&path);
    tracing::debug!("Serving {:?} ({} bytes, {})", path, length, content_type);

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(FALLBACK_CONTENT_TYPE)),
    );
    headers.insert(
        header::CONNECTION,
        HeaderValue::from_static(if keep_alive { "keep-alive" } else { "close" }),
    );

    // never send more than the advertised length
    let body = Body::from_stream(ReaderStream::new(file.take(length)));
    Ok((StatusCode::OK, headers, body).into_response())
}

/// resolve a requested name to a regular file inside `parent`
pub async fn resolve_target(parent: &Path, file_name: &str) -> Result<PathBuf, AppError> {
    let candidate = parent.join(file_name);
    if is_hidden(&candidate) {
        return Err(AppError::NotFound);
    }

    let root = fs::canonicalize(parent).await.map_err(|e| {
        tracing::warn!("Parent directory {:?} is not accessible: {}", parent, e);
        AppError::NotFound
    })?;
    let resolved = fs::canonicalize(&candidate)
        .await
        .map_err(|_| AppError::NotFound)?;
    if !resolved.starts_with(&root) {
        tracing::warn!("🚫 Rejected path outside of {:?}: {:?}", root, file_name);
        return Err(AppError::NotFound);
    }

    let metadata = fs::metadata(&resolved)
        .await
        .map_err(|_| AppError::NotFound)?;
    if metadata.is_dir() {
        return Err(AppError::NotFound);
    }
    if !metadata.is_file() {
        return Err(AppError::Forbidden);
    }

    Ok(resolved)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}
