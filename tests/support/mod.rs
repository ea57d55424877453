#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use filedrop::config::Config;
use bytes::Bytes;
use filedrop::multipart::{FilePart, MultipartDecoder, NextPart, Part};
use futures_util::Stream;
use filedrop::state::AppState;
use tempfile::TempDir;

pub const BOUNDARY: &str = "----filedropBoundary7MA4YWxk";

/// parent directory, scratch root and the state pointing at them
pub struct Fixture {
    pub root: TempDir,
    pub scratch: TempDir,
    pub state: Arc<AppState>,
}

impl Fixture {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("upload")).unwrap();

        let config = Config {
            path_parent: root.path().to_path_buf(),
            path_dir: "upload".to_string(),
            url_parent: "http://files.test/?file=".to_string(),
            temp_dir: scratch.path().to_path_buf(),
            ..Config::default()
        };

        Self {
            root,
            scratch,
            state: Arc::new(AppState::new(config)),
        }
    }

    pub fn write(&self, name: &str, data: &[u8]) {
        let path = self.root.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, data).unwrap();
    }

    /// entries left in the scratch root
    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.scratch.path()).unwrap().count()
    }
}

pub fn content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}

/// a body with one text field followed by one file part
pub fn multipart_body(filename: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"caption\"\r\n\r\n\
             holiday\r\n\
             --{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// `body` as a stream of `chunk_size` byte chunks
pub fn body_stream(
    body: Vec<u8>,
    chunk_size: usize,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
    let chunks: Vec<_> = body
        .chunks(chunk_size)
        .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
        .collect();
    futures_util::stream::iter(chunks)
}

/// decode `data` as an uploaded file into `scratch`
pub async fn file_part(scratch: &Path, filename: &str, data: &[u8]) -> FilePart {
    let body = body_stream(multipart_body(filename, data), 1024);
    let mut decoder = MultipartDecoder::new(body, BOUNDARY, scratch);

    loop {
        match decoder.next_part().await.unwrap() {
            NextPart::Ready(Part::File(file)) => return file,
            NextPart::Ready(Part::Field(_)) | NextPart::Pending => continue,
            NextPart::Exhausted => panic!("no file part decoded"),
        }
    }
}

pub fn encode(image: &image::DynamicImage, format: image::ImageFormat) -> Vec<u8> {
    let mut out = std::io::Cursor::new(Vec::new());
    image.write_to(&mut out, format).unwrap();
    out.into_inner()
}
