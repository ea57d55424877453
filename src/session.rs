use axum::http::{header, HeaderMap};
use bytes::Bytes;
use futures_util::Stream;
use std::path::Path;
use tempfile::TempDir;
use uuid::Uuid;

use crate::multipart::{DecodeError, MultipartDecoder, NextPart};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    /// opened, no part pulled yet
    Idle,
    Decoding,
    /// closing boundary reached or session closed
    Terminal,
}

/// decoding state for one POST request
///
/// Owns the multipart decoder and a scratch directory holding the temporary
/// files of its parts. Dropping the session removes the scratch directory,
/// so an aborted request never leaves part files behind.
pub struct UploadSession {
    id: Uuid,
    chunked: bool,
    state: SessionState,
    // declared before `scratch` so part files are dropped first
    decoder: MultipartDecoder,
    scratch: TempDir,
}

impl UploadSession {
    /// start a session from the request headers and its body stream
    pub fn open<S, O, E>(headers: &HeaderMap, body: S, temp_root: &Path) -> Result<Self, DecodeError>
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .ok_or(DecodeError::NotMultipart)?;

        let chunked = headers
            .get_all(header::TRANSFER_ENCODING)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"));

        let scratch = tempfile::Builder::new()
            .prefix("upload-")
            .tempdir_in(temp_root)?;
        let decoder = MultipartDecoder::from_content_type(content_type, body, scratch.path())?;

        let id = Uuid::new_v4();
        tracing::debug!(session = %id, chunked, "Upload session opened in {:?}", scratch.path());

        Ok(Self {
            id,
            chunked,
            state: SessionState::Idle,
            decoder,
            scratch,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// whether the body arrives with chunked transfer encoding
    pub fn is_chunked(&self) -> bool {
        self.chunked
    }

    /// pull the next part; once exhausted the session accepts no more input
    pub async fn next_part(&mut self) -> Result<NextPart, DecodeError> {
        if self.state == SessionState::Terminal {
            return Ok(NextPart::Exhausted);
        }
        self.state = SessionState::Decoding;

        let next = self.decoder.next_part().await;
        if matches!(next, Ok(NextPart::Exhausted)) {
            self.state = SessionState::Terminal;
        }
        next
    }

    /// tear the session down, removing its scratch directory
    pub fn close(mut self) {
        self.state = SessionState::Terminal;
    }
}

impl Drop for UploadSession {
    fn drop(&mut self) {
        if self.state == SessionState::Terminal {
            tracing::debug!(session = %self.id, "Upload session closed, removing {:?}", self.scratch.path());
        } else {
            tracing::debug!(session = %self.id, "Upload session aborted, releasing temporary files");
        }
    }
}
