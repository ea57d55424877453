use axum::extract::{Query, Request, State};
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Json, Response};
use std::sync::Arc;

use crate::error::AppError;
use crate::models::UploadResponse;
use crate::multipart::{FilePart, NextPart, Part};
use crate::session::UploadSession;
use crate::state::AppState;
use crate::transfer;
use crate::upload::{self, UploadError};
use crate::utils::is_keep_alive;

// query param used to download a file
pub const FILE_QUERY_PARAM: &str = "file";

pub const JSON_UTF8: &str = "application/json; charset=UTF-8";

/// route every request by method, regardless of path
pub async fn dispatch(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let method = request.method().clone();
    tracing::info!("{} request received", method);

    let result = match method {
        Method::GET => {
            // read everything needed from the request before awaiting
            let file_name = file_param(request.uri());
            let keep_alive = is_keep_alive(request.version(), request.headers());
            serve_file(&state, file_name, keep_alive).await
        }
        Method::POST => upload_file(state, request).await,
        _ => {
            tracing::info!("{} request received, sending 405", method);
            Err(AppError::MethodNotAllowed)
        }
    };

    result.unwrap_or_else(IntoResponse::into_response)
}

// serve the file named by the `file` query param
async fn serve_file(
    state: &AppState,
    file_name: Option<String>,
    keep_alive: bool,
) -> Result<Response, AppError> {
    let file_name = file_name.ok_or(AppError::MissingFileParam)?;
    transfer::serve(state, &file_name, keep_alive).await
}

/// first non-empty `file` query param, if any
pub fn file_param(uri: &Uri) -> Option<String> {
    let Query(params) = Query::<Vec<(String, String)>>::try_from_uri(uri).ok()?;
    params
        .into_iter()
        .find(|(key, _)| key == FILE_QUERY_PARAM)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

// decode a multipart body part by part and persist its first file part
async fn upload_file(state: Arc<AppState>, request: Request) -> Result<Response, AppError> {
    let (parts, body) = request.into_parts();
    let mut session = UploadSession::open(
        &parts.headers,
        body.into_data_stream(),
        &state.config.temp_dir,
    )?;
    tracing::debug!(
        session = %session.id(),
        "Reading {} upload",
        if session.is_chunked() { "chunked" } else { "single-shot" }
    );

    loop {
        match session.next_part().await? {
            NextPart::Ready(Part::File(file)) => {
                let payload = persist_off_loop(&state, file).await?;
                // answer right away, whatever follows in the body is never read
                session.close();
                return Ok(upload_response(payload));
            }
            NextPart::Ready(Part::Field(field)) => {
                tracing::debug!("Ignoring form field {:?}", field.name);
            }
            NextPart::Pending => {}
            NextPart::Exhausted => {
                session.close();
                return Err(AppError::NoFilePart);
            }
        }
    }
}

// image work and the final rename block, keep them off the async workers
async fn persist_off_loop(state: &Arc<AppState>, part: FilePart) -> Result<UploadResponse, AppError> {
    let state = Arc::clone(state);
    let persisted = tokio::task::spawn_blocking(move || upload::persist(part, &state.config))
        .await
        .map_err(UploadError::from)?;
    Ok(persisted?)
}

fn upload_response(payload: UploadResponse) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, JSON_UTF8),
            (header::CONNECTION, "close"),
        ],
        Json(payload),
    )
        .into_response()
}
