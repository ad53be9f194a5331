use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::Context;
use batch_core::{CandidateFile, Dimensions, MAX_BATCH_ITEMS};
use batch_logging::batch_debug;
use image::{ImageFormat, ImageReader};

/// Media type given to files that are not recognisable images.
pub const UNKNOWN_MEDIA_TYPE: &str = "application/octet-stream";

/// Media type from the file's magic bytes, falling back to its extension.
pub fn sniff_media_type(path: &Path, bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes)
        .ok()
        .or_else(|| ImageFormat::from_path(path).ok())
        .map(|format| format.to_mime_type())
}

/// Reads a file from disk as a selection candidate.
pub fn load_candidate(path: &Path) -> anyhow::Result<CandidateFile> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let media_type = sniff_media_type(path, &bytes).unwrap_or(UNKNOWN_MEDIA_TYPE);
    Ok(CandidateFile::new(name, media_type, bytes))
}

/// Reads inputs in order until a full batch of images is collected.
///
/// Paths past that point are never opened, so they cannot fail the batch.
pub fn load_candidates(paths: &[PathBuf]) -> anyhow::Result<Vec<CandidateFile>> {
    let mut files = Vec::new();
    let mut images = 0;
    for path in paths {
        if images == MAX_BATCH_ITEMS {
            batch_debug!(
                "ignoring {} input(s) past a full batch",
                paths.len() - files.len()
            );
            break;
        }
        let file = load_candidate(path)?;
        if file.is_image() {
            images += 1;
        }
        files.push(file);
    }
    Ok(files)
}

/// Pixel size read from the image header, without decoding pixels.
pub fn natural_dimensions(bytes: &[u8]) -> Option<Dimensions> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    let (width, height) = reader.into_dimensions().ok()?;
    Some(Dimensions::new(width, height))
}
