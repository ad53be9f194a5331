use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use batch_logging::batch_info;
use bytes::Bytes;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::persist::{AtomicFileWriter, PersistError};

/// Default archive name offered for "Download All".
pub const DEFAULT_BUNDLE_FILENAME: &str = "images.zip";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub entry_count: usize,
    pub byte_len: u64,
    pub output_path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Packs the entries into an in-memory zip; `None` when there is nothing to pack.
pub fn build_bundle(entries: &[ArchiveEntry]) -> Result<Option<Vec<u8>>, ExportError> {
    if entries.is_empty() {
        return Ok(None);
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for entry in entries {
        zip.start_file(entry.name.as_str(), options)?;
        zip.write_all(&entry.bytes)?;
    }
    Ok(Some(zip.finish()?.into_inner()))
}

/// Builds the bundle and writes it to `{dir}/{filename}`. No file is created for an empty list.
pub fn write_bundle(
    dir: &Path,
    filename: &str,
    entries: &[ArchiveEntry],
) -> Result<Option<ExportSummary>, ExportError> {
    let Some(archive) = build_bundle(entries)? else {
        return Ok(None);
    };
    let writer = AtomicFileWriter::new(dir.to_path_buf());
    let output_path = writer.write(filename, &archive)?;
    batch_info!(
        "wrote {} with {} entries ({} bytes)",
        output_path.display(),
        entries.len(),
        archive.len()
    );
    Ok(Some(ExportSummary {
        entry_count: entries.len(),
        byte_len: archive.len() as u64,
        output_path,
    }))
}

/// Writes one processed output next to the bundle.
pub fn write_output(dir: &Path, entry: &ArchiveEntry) -> Result<PathBuf, ExportError> {
    let writer = AtomicFileWriter::new(dir.to_path_buf());
    Ok(writer.write(&entry.name, &entry.bytes)?)
}
