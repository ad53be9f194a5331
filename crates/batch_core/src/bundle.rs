use std::collections::HashSet;

use bytes::Bytes;

use crate::item::{ItemStatus, QueueItem};
use crate::params::OutputFormat;

/// One file destined for the download archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEntry {
    pub file_name: String,
    pub bytes: Bytes,
}

/// Name of the processed file: source base name plus the format's extension.
///
/// `photo.png` with [`OutputFormat::Jpeg`] becomes `photo.jpg`.
pub fn output_file_name(display_name: &str, format: &OutputFormat) -> String {
    let base = strip_extension(display_name);
    let ext = format.extension_for(display_name);
    sanitize(&format!("{base}.{ext}"))
}

/// Download name of every queue item, in queue order.
///
/// Names are unique across the whole queue, so a single download and the
/// archive agree on what each item is called.
pub fn output_names(items: &[QueueItem], format: &OutputFormat) -> Vec<String> {
    let mut used = HashSet::new();
    items
        .iter()
        .map(|item| unique_name(output_file_name(item.display_name(), format), &mut used))
        .collect()
}

/// Collects every finished output, in queue order, with unique names.
pub fn bundle_entries(items: &[QueueItem], format: &OutputFormat) -> Vec<BundleEntry> {
    items
        .iter()
        .zip(output_names(items, format))
        .filter(|(item, _)| item.status() == ItemStatus::Done)
        .filter_map(|(item, file_name)| {
            Some(BundleEntry {
                file_name,
                bytes: item.output()?.bytes.clone(),
            })
        })
        .collect()
}

fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((base, ext)) if !ext.is_empty() => base,
        _ => name,
    }
}

// Archive entry names must not introduce directories.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect()
}

fn unique_name(name: String, used: &mut HashSet<String>) -> String {
    if used.insert(name.clone()) {
        return name;
    }
    let (base, ext) = match name.rsplit_once('.') {
        Some((base, ext)) => (base.to_string(), format!(".{ext}")),
        None => (name.clone(), String::new()),
    };
    let mut n = 2;
    loop {
        let candidate = format!("{base} ({n}){ext}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jpeg_maps_to_jpg_extension() {
        assert_eq!(output_file_name("photo.png", &OutputFormat::Jpeg), "photo.jpg");
    }

    #[test]
    fn other_formats_use_their_own_name() {
        assert_eq!(output_file_name("photo.png", &OutputFormat::Webp), "photo.webp");
        assert_eq!(
            output_file_name("photo.png", &OutputFormat::parse("tiff")),
            "photo.tiff"
        );
    }

    #[test]
    fn original_keeps_source_extension_or_falls_back_to_webp() {
        assert_eq!(output_file_name("scan.TIF", &OutputFormat::Original), "scan.TIF");
        assert_eq!(output_file_name("noext", &OutputFormat::Original), "noext.webp");
    }

    #[test]
    fn only_last_extension_is_replaced() {
        assert_eq!(
            output_file_name("archive.tar.png", &OutputFormat::Png),
            "archive.tar.png"
        );
        assert_eq!(output_file_name("a.b.gif", &OutputFormat::Avif), "a.b.avif");
    }

    #[test]
    fn separators_are_flattened() {
        assert_eq!(output_file_name("dir/x.png", &OutputFormat::Png), "dir_x.png");
    }

    #[test]
    fn names_are_unique_across_the_queue() {
        let registry = crate::HandleRegistry::new();
        let files = ["x.png", "x.jpg", "y.png"]
            .into_iter()
            .map(|name| crate::CandidateFile::new(name, "image/png", Bytes::new()))
            .collect();
        let items = crate::build_queue(files, 1, &registry);
        assert_eq!(
            output_names(&items, &OutputFormat::Webp),
            vec!["x.webp", "x (2).webp", "y.webp"]
        );
    }

    #[test]
    fn duplicate_names_get_a_counter() {
        let mut used = HashSet::new();
        assert_eq!(unique_name("a.jpg".into(), &mut used), "a.jpg");
        assert_eq!(unique_name("a.jpg".into(), &mut used), "a (2).jpg");
        assert_eq!(unique_name("a.jpg".into(), &mut used), "a (3).jpg");
    }
}
