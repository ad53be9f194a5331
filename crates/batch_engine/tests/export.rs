use std::fs;
use std::io::{Cursor, Read};

use batch_engine::{
    build_bundle, ensure_output_dir, write_bundle, write_output, ArchiveEntry, AtomicFileWriter,
    DEFAULT_BUNDLE_FILENAME,
};
use bytes::Bytes;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn entry(name: &str, body: &'static [u8]) -> ArchiveEntry {
    ArchiveEntry {
        name: name.to_string(),
        bytes: Bytes::from_static(body),
    }
}

fn read_archive(bytes: Vec<u8>) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).unwrap();
            let mut body = Vec::new();
            file.read_to_end(&mut body).unwrap();
            (file.name().to_string(), body)
        })
        .collect()
}

#[test]
fn bundle_contains_every_entry_in_order() {
    let archive = build_bundle(&[entry("photo.jpg", b"first"), entry("other.jpg", b"second")])
        .unwrap()
        .expect("archive");

    assert_eq!(
        read_archive(archive),
        vec![
            ("photo.jpg".to_string(), b"first".to_vec()),
            ("other.jpg".to_string(), b"second".to_vec()),
        ]
    );
}

#[test]
fn empty_bundle_is_a_noop() {
    assert!(build_bundle(&[]).unwrap().is_none());

    let temp = TempDir::new().unwrap();
    let summary = write_bundle(temp.path(), DEFAULT_BUNDLE_FILENAME, &[]).unwrap();
    assert!(summary.is_none());
    assert!(!temp.path().join(DEFAULT_BUNDLE_FILENAME).exists());
}

#[test]
fn written_bundle_lands_in_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("exports");

    let summary = write_bundle(&dir, "images.zip", &[entry("a.webp", b"a")])
        .unwrap()
        .expect("summary");

    assert_eq!(summary.entry_count, 1);
    assert_eq!(summary.output_path, dir.join("images.zip"));
    let on_disk = fs::read(&summary.output_path).unwrap();
    assert_eq!(on_disk.len() as u64, summary.byte_len);
    assert_eq!(read_archive(on_disk).len(), 1);
}

#[test]
fn single_output_is_written_verbatim() {
    let temp = TempDir::new().unwrap();
    let path = write_output(temp.path(), &entry("one.png", b"pixels")).unwrap();
    assert_eq!(fs::read(path).unwrap(), b"pixels");
}

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("out");
    assert!(!new_dir.exists());
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn atomic_write_replaces_existing_file() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("images.zip", b"hello").unwrap();
    assert_eq!(first.file_name().unwrap(), "images.zip");
    assert_eq!(fs::read(&first).unwrap(), b"hello");

    let second = writer.write("images.zip", b"world").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read(&second).unwrap(), b"world");
}

#[test]
fn no_partial_file_when_dir_is_a_file() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    assert!(writer.write("images.zip", b"data").is_err());
    assert!(!file_path.with_file_name("images.zip").exists());
}
