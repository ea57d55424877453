//! Streaming `multipart/form-data` decoding on top of `multer`.
//!
//! Text fields are collected in memory, file parts stream chunk by chunk into
//! temporary files so the body is never held in memory as a whole. Each call
//! to [`MultipartDecoder::next_part`] consumes at most one chunk of the current
//! part and reports `Pending` until that part is complete.

use bytes::Bytes;
use futures_util::Stream;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// largest in-memory text field
pub const MAX_FIELD_BYTES: usize = 64 * 1024;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("not a multipart request")]
    NotMultipart,
    #[error("multipart content type has no boundary")]
    MissingBoundary,
    #[error("malformed multipart body: {0}")]
    Malformed(String),
    #[error("part `{0}` ended before its closing boundary")]
    IncompletePart(String),
    #[error("form field `{0}` exceeds 64 KiB")]
    FieldTooLarge(String),
    #[error("failed to read request body: {0}")]
    Body(String),
    #[error("failed to buffer file part: {0}")]
    Io(#[from] std::io::Error),
}

impl From<multer::Error> for DecodeError {
    fn from(err: multer::Error) -> Self {
        match err {
            multer::Error::IncompleteFieldData { field_name } => {
                DecodeError::IncompletePart(field_name.unwrap_or_default())
            }
            multer::Error::StreamReadFailed(e) => DecodeError::Body(e.to_string()),
            multer::Error::NoMultipart | multer::Error::DecodeContentType(_) => {
                DecodeError::NotMultipart
            }
            multer::Error::NoBoundary => DecodeError::MissingBoundary,
            other => DecodeError::Malformed(other.to_string()),
        }
    }
}

/// a text field from the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub value: String,
}

/// a file upload backed by a temporary file
#[derive(Debug)]
pub struct FilePart {
    name: String,
    filename: String,
    content_type: Option<String>,
    file: NamedTempFile,
    size: u64,
}

impl FilePart {
    /// form field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// filename as sent by the client
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// bytes written to the backing file
    pub fn size(&self) -> u64 {
        self.size
    }

    /// location of the backing temporary file
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// hand over the backing file; it is deleted on drop unless persisted
    pub fn into_temp_file(self) -> NamedTempFile {
        self.file
    }
}

#[derive(Debug)]
pub enum Part {
    Field(FormField),
    File(FilePart),
}

/// result of pulling the next part
#[derive(Debug)]
pub enum NextPart {
    Ready(Part),
    /// a part is still being read, call again
    Pending,
    /// the closing boundary was reached and every part has been handed out
    Exhausted,
}

// part currently being written
enum Sink {
    Field {
        name: String,
        value: Vec<u8>,
    },
    File {
        name: String,
        filename: String,
        content_type: Option<String>,
        file: NamedTempFile,
        size: u64,
    },
}

impl Sink {
    fn write(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        match self {
            Sink::Field { name, value } => {
                if value.len() + data.len() > MAX_FIELD_BYTES {
                    return Err(DecodeError::FieldTooLarge(name.clone()));
                }
                value.extend_from_slice(data);
            }
            Sink::File { file, size, .. } => {
                file.write_all(data)?;
                *size += data.len() as u64;
            }
        }
        Ok(())
    }

    fn complete(self) -> Result<Part, DecodeError> {
        Ok(match self {
            Sink::Field { name, value } => Part::Field(FormField {
                name,
                value: String::from_utf8_lossy(&value).into_owned(),
            }),
            Sink::File {
                name,
                filename,
                content_type,
                mut file,
                size,
            } => {
                file.flush()?;
                tracing::trace!("File part {:?} complete ({} bytes)", filename, size);
                Part::File(FilePart {
                    name,
                    filename,
                    content_type,
                    file,
                    size,
                })
            }
        })
    }
}

pub struct MultipartDecoder {
    multipart: multer::Multipart<'static>,
    current: Option<(multer::Field<'static>, Sink)>,
    scratch_dir: PathBuf,
    exhausted: bool,
}

impl MultipartDecoder {
    /// decode `stream` split on `boundary`; file parts are buffered in `scratch_dir`
    pub fn new<S, O, E>(stream: S, boundary: &str, scratch_dir: impl Into<PathBuf>) -> Self
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        Self {
            multipart: multer::Multipart::new(stream, boundary.to_string()),
            current: None,
            scratch_dir: scratch_dir.into(),
            exhausted: false,
        }
    }

    /// create a decoder from a request `Content-Type` header value
    pub fn from_content_type<S, O, E>(
        content_type: &str,
        stream: S,
        scratch_dir: impl Into<PathBuf>,
    ) -> Result<Self, DecodeError>
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        let boundary = parse_boundary(content_type)?;
        Ok(Self::new(stream, &boundary, scratch_dir))
    }

    /// pull the next decoded part, reading at most one body chunk
    ///
    /// On error the part being read is dropped along with its temp file.
    pub async fn next_part(&mut self) -> Result<NextPart, DecodeError> {
        if self.exhausted {
            return Ok(NextPart::Exhausted);
        }

        match self.current.take() {
            None => self.open_part().await,
            Some((mut field, mut sink)) => match field.chunk().await? {
                Some(chunk) => {
                    sink.write(&chunk)?;
                    self.current = Some((field, sink));
                    Ok(NextPart::Pending)
                }
                None => Ok(NextPart::Ready(sink.complete()?)),
            },
        }
    }

    async fn open_part(&mut self) -> Result<NextPart, DecodeError> {
        let Some(field) = self.multipart.next_field().await? else {
            tracing::trace!("closing boundary reached");
            self.exhausted = true;
            return Ok(NextPart::Exhausted);
        };

        let name = field
            .name()
            .map(str::to_string)
            .ok_or_else(|| DecodeError::Malformed("part without a name".to_string()))?;

        let sink = match field.file_name() {
            Some(filename) => {
                tracing::debug!("Receiving file part {:?} ({})", filename, name);
                Sink::File {
                    name,
                    filename: filename.to_string(),
                    content_type: field.content_type().map(|mime| mime.to_string()),
                    file: NamedTempFile::new_in(&self.scratch_dir)?,
                    size: 0,
                }
            }
            None => Sink::Field {
                name,
                value: Vec::new(),
            },
        };

        self.current = Some((field, sink));
        Ok(NextPart::Pending)
    }
}

/// extract the boundary from a `multipart/form-data` content type
pub fn parse_boundary(content_type: &str) -> Result<String, DecodeError> {
    let boundary = multer::parse_boundary(content_type)?;
    if boundary.is_empty() {
        return Err(DecodeError::MissingBoundary);
    }
    Ok(boundary)
}
