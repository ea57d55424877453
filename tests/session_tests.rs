mod support;

use axum::http::{header, HeaderMap, HeaderValue};
use filedrop::multipart::{DecodeError, NextPart, Part};
use filedrop::session::UploadSession;
use support::{body_stream, content_type, multipart_body};

fn multipart_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type()).unwrap(),
    );
    headers
}

fn entries(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[test]
fn test_open_requires_multipart() {
    let scratch = tempfile::tempdir().unwrap();
    let body = || body_stream(Vec::new(), 1);

    let result = UploadSession::open(&HeaderMap::new(), body(), scratch.path());
    assert!(matches!(result, Err(DecodeError::NotMultipart)));

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    let result = UploadSession::open(&headers, body(), scratch.path());
    assert!(matches!(result, Err(DecodeError::NotMultipart)));

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("multipart/form-data"),
    );
    let result = UploadSession::open(&headers, body(), scratch.path());
    assert!(matches!(result, Err(DecodeError::MissingBoundary)));

    // failed opens leave nothing behind
    assert_eq!(entries(scratch.path()), 0);
}

#[test]
fn test_chunked_detection() {
    let scratch = tempfile::tempdir().unwrap();

    let session =
        UploadSession::open(&multipart_headers(), body_stream(Vec::new(), 1), scratch.path())
            .unwrap();
    assert!(!session.is_chunked());

    let mut headers = multipart_headers();
    headers.insert(
        header::TRANSFER_ENCODING,
        HeaderValue::from_static("gzip, Chunked"),
    );
    let session = UploadSession::open(&headers, body_stream(Vec::new(), 1), scratch.path()).unwrap();
    assert!(session.is_chunked());
}

#[tokio::test]
async fn test_parts_then_terminal() {
    let scratch = tempfile::tempdir().unwrap();
    let body = body_stream(multipart_body("a.txt", b"abc"), 10);
    let mut session = UploadSession::open(&multipart_headers(), body, scratch.path()).unwrap();

    let mut parts = Vec::new();
    loop {
        match session.next_part().await.unwrap() {
            NextPart::Ready(part) => parts.push(part),
            NextPart::Pending => {}
            NextPart::Exhausted => break,
        }
    }
    assert!(matches!(parts[0], Part::Field(_)));
    assert!(matches!(parts[1], Part::File(_)));

    // nothing more is read once terminal
    assert!(matches!(session.next_part().await, Ok(NextPart::Exhausted)));
}

#[tokio::test]
async fn test_scratch_dir_removed_on_close() {
    let scratch = tempfile::tempdir().unwrap();
    let body = body_stream(multipart_body("a.txt", b"abc"), 64);
    let mut session = UploadSession::open(&multipart_headers(), body, scratch.path()).unwrap();
    assert_eq!(entries(scratch.path()), 1);

    while !matches!(session.next_part().await.unwrap(), NextPart::Exhausted) {}
    session.close();
    assert_eq!(entries(scratch.path()), 0);
}

#[tokio::test]
async fn test_aborted_session_releases_part_files() {
    let scratch = tempfile::tempdir().unwrap();
    let body = body_stream(multipart_body("big.bin", &[1u8; 8192]), 512);
    let mut session = UploadSession::open(&multipart_headers(), body, scratch.path()).unwrap();

    // stop somewhere inside the file part
    let mut pulled = 0;
    while pulled < 8 {
        if let NextPart::Ready(Part::File(_)) = session.next_part().await.unwrap() {
            panic!("file part completed too early");
        }
        pulled += 1;
    }

    drop(session);
    assert_eq!(entries(scratch.path()), 0);
}
