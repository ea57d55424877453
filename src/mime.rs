use std::collections::HashMap;
use std::path::Path;

/// content type sent for extensions missing from the table
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

const DEFAULT_TYPES: &[(&str, &str)] = &[
    // images
    ("png", "image/png"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("bmp", "image/bmp"),
    ("gif", "image/gif"),
    // documents
    ("txt", "text/plain"),
    ("pdf", "application/pdf"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("json", "application/json"),
    ("zip", "application/zip"),
];

/// maps file extensions to mime types
#[derive(Debug, Clone)]
pub struct ContentTypeResolver {
    types: HashMap<String, String>,
}

impl Default for ContentTypeResolver {
    fn default() -> Self {
        Self {
            types: DEFAULT_TYPES
                .iter()
                .map(|(ext, mime)| (ext.to_string(), mime.to_string()))
                .collect(),
        }
    }
}

impl ContentTypeResolver {
    /// register (or override) the mime type for one or more extensions
    pub fn with_type(mut self, mime: &str, extensions: &[&str]) -> Self {
        for ext in extensions {
            self.types
                .insert(ext.trim_start_matches('.').to_ascii_lowercase(), mime.to_string());
        }
        self
    }

    /// mime type for the file at `path`, keyed by its extension
    pub fn resolve(&self, path: &Path) -> &str {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.types.get(&ext.to_ascii_lowercase()))
            .map(String::as_str)
            .unwrap_or(FALLBACK_CONTENT_TYPE)
    }
}
