use crate::item::{ItemId, ItemStatus, QueueItem};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub tool: &'static str,
    pub rows: Vec<ItemRowView>,
    pub item_count: usize,
    /// Overall batch progress, 0..=100.
    pub progress: u8,
    pub running: bool,
    pub selected: Option<ItemId>,
    pub can_download_all: bool,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRowView {
    pub item_id: ItemId,
    pub name: String,
    pub size_label: String,
    pub status: ItemStatus,
    pub preview_uri: String,
    pub output_uri: Option<String>,
    pub download_name: Option<String>,
    pub error: Option<String>,
    pub row_progress: u8,
}

impl ItemRowView {
    pub(crate) fn from_item(item: &QueueItem, output_name: String) -> Self {
        let status = item.status();
        Self {
            item_id: item.id(),
            name: item.display_name().to_string(),
            size_label: format_bytes(item.size_bytes()),
            status,
            preview_uri: item.source().handle.uri(),
            output_uri: item.output().map(|output| output.handle.uri()),
            download_name: item.output().map(|_| output_name),
            error: item.error_message().map(str::to_string),
            row_progress: match status {
                ItemStatus::Done => 100,
                ItemStatus::Processing => 50,
                ItemStatus::Queued | ItemStatus::Error => 0,
            },
        }
    }
}

/// Done items count fully, processing items count half.
pub fn overall_progress(items: &[QueueItem]) -> u8 {
    if items.is_empty() {
        return 0;
    }
    let done = items
        .iter()
        .filter(|item| item.status() == ItemStatus::Done)
        .count();
    let processing = items
        .iter()
        .filter(|item| item.status() == ItemStatus::Processing)
        .count();
    progress_percent(done, processing, items.len())
}

/// `min(100, round(100 * (done + processing / 2) / total))`; `0` for an empty batch.
pub fn progress_percent(done: usize, processing: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let ratio = (done as f64 + processing as f64 * 0.5) / total as f64;
    (ratio * 100.0).round().min(100.0) as u8
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}
