use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader, Rgb, RgbImage};
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::config::Config;
use crate::models::UploadResponse;
use crate::multipart::FilePart;

/// images wider than this are scaled down to it
pub const MAX_IMAGE_WIDTH: u32 = 1000;

static LAST_SUFFIX: AtomicI64 = AtomicI64::new(0);

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("failed to move upload into place: {0}")]
    Io(#[from] std::io::Error),
    #[error("upload processing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// move a completed file part into the public upload directory
///
/// Oversized images are shrunk first. Image handling is best effort: anything
/// that fails to decode or re-encode is persisted as received.
pub fn persist(part: FilePart, config: &Config) -> Result<UploadResponse, UploadError> {
    let new_name = persisted_name(part.filename(), next_suffix());

    match shrink_if_oversized(part.path()) {
        Ok(Some((width, height))) => {
            tracing::info!("🖼️  Resized {} to {}x{}", part.filename(), width, height);
        }
        Ok(None) => tracing::debug!("{} needs no resizing", part.filename()),
        Err(e) => tracing::debug!("Skipping image processing for {}: {}", part.filename(), e),
    }

    let target = config.upload_dir().join(&new_name);
    let size = part.size();
    tracing::debug!(
        "Persisting field {:?} as {:?} ({})",
        part.name(),
        target,
        part.content_type().unwrap_or("no content type")
    );
    move_into_place(part.into_temp_file(), &target)?;

    tracing::info!("✅ Uploaded file: {} ({} bytes)", new_name, size);
    Ok(UploadResponse {
        url: config.url_for(&new_name),
    })
}

/// `<base>_<suffix>.<ext>` for an uploaded filename
///
/// Directory components sent by the client are dropped.
pub fn persisted_name(original: &str, suffix: i64) -> String {
    let file_name = original
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(original);

    match file_name.rsplit_once('.') {
        Some((base, ext)) if !ext.is_empty() => format!("{base}_{suffix}.{ext}"),
        Some((base, _)) => format!("{base}_{suffix}"),
        None => format!("{file_name}_{suffix}"),
    }
}

/// current time in milliseconds, strictly increasing across calls
pub fn next_suffix() -> i64 {
    let now = chrono::Utc::now().timestamp_millis();
    let previous = LAST_SUFFIX
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or(now);
    now.max(previous + 1)
}

/// target dimensions for an image, or `None` when it can stay as is
pub fn resize_policy(width: u32, height: u32) -> Option<(u32, u32)> {
    let portrait_oversized = width < height && width > MAX_IMAGE_WIDTH;
    let landscape_oversized = width >= height && width > MAX_IMAGE_WIDTH;
    if !(portrait_oversized || landscape_oversized) {
        return None;
    }

    let scaled = (f64::from(height) * f64::from(MAX_IMAGE_WIDTH) / f64::from(width)).round();
    Some((MAX_IMAGE_WIDTH, (scaled as u32).max(1)))
}

/// shrink the image at `path` in place, returning the new size if it changed
pub fn shrink_if_oversized(path: &Path) -> Result<Option<(u32, u32)>, image::ImageError> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    let Some((width, height)) = resize_policy(image.width(), image.height()) else {
        return Ok(None);
    };

    let resized = image.resize_exact(width, height, FilterType::Lanczos3);
    let canvas = DynamicImage::ImageRgb8(flatten_onto_canvas(&resized));

    // encode fully before touching the original bytes
    let mut encoded = Cursor::new(Vec::new());
    canvas.write_to(&mut encoded, ImageFormat::Jpeg)?;
    std::fs::write(path, encoded.into_inner())?;

    Ok(Some((width, height)))
}

// composite onto an opaque black canvas so jpeg never sees an alpha channel
fn flatten_onto_canvas(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    let mut canvas = RgbImage::new(rgba.width(), rgba.height());

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let blend = |c: u8| ((u16::from(c) * u16::from(a) + 127) / 255) as u8;
        canvas.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    canvas
}

fn move_into_place(file: NamedTempFile, target: &Path) -> std::io::Result<()> {
    match file.persist(target) {
        Ok(_) => Ok(()),
        Err(e) => {
            // rename fails across filesystems, copy instead
            tracing::debug!("Rename into {:?} failed ({}), copying", target, e.error);
            std::fs::copy(e.file.path(), target)?;
            Ok(())
        }
    }
}
