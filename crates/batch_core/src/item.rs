use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

use crate::handle::{DisplayHandle, HandleRegistry};

/// Upper bound on the number of files accepted into one batch.
pub const MAX_BATCH_ITEMS: usize = 3;

/// Stable identity of a queue item: batch creation time plus position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId {
    created_ms: u64,
    index: u32,
}

impl ItemId {
    pub fn new(created_ms: u64, index: u32) -> Self {
        Self { created_ms, index }
    }

    pub fn created_ms(self) -> u64 {
        self.created_ms
    }

    pub fn index(self) -> u32 {
        self.index
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.created_ms, self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid item id: {0:?}")]
pub struct ParseItemIdError(String);

impl FromStr for ItemId {
    type Err = ParseItemIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (created, index) = s
            .split_once('-')
            .ok_or_else(|| ParseItemIdError(s.to_string()))?;
        let created_ms = created
            .parse()
            .map_err(|_| ParseItemIdError(s.to_string()))?;
        let index = index.parse().map_err(|_| ParseItemIdError(s.to_string()))?;
        Ok(Self { created_ms, index })
    }
}

/// A raw entry from a file picker or a drop event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Bytes,
}

impl CandidateFile {
    pub fn new(
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn is_image(&self) -> bool {
        self.media_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("image/")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemStatus {
    Queued,
    Processing,
    Done,
    Error,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Queued => "queued",
            ItemStatus::Processing => "processing",
            ItemStatus::Done => "done",
            ItemStatus::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Done | ItemStatus::Error)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The uploaded bytes plus their preview handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub bytes: Bytes,
    pub media_type: String,
    pub handle: DisplayHandle,
}

/// The processed bytes plus their preview handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRef {
    pub bytes: Bytes,
    pub media_type: Option<String>,
    pub handle: DisplayHandle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemState {
    Queued,
    Processing,
    Done(OutputRef),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    id: ItemId,
    display_name: String,
    size_bytes: u64,
    source: SourceRef,
    state: ItemState,
}

impl QueueItem {
    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn source(&self) -> &SourceRef {
        &self.source
    }

    pub fn state(&self) -> &ItemState {
        &self.state
    }

    pub fn status(&self) -> ItemStatus {
        match self.state {
            ItemState::Queued => ItemStatus::Queued,
            ItemState::Processing => ItemStatus::Processing,
            ItemState::Done(_) => ItemStatus::Done,
            ItemState::Error(_) => ItemStatus::Error,
        }
    }

    pub fn output(&self) -> Option<&OutputRef> {
        match &self.state {
            ItemState::Done(output) => Some(output),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            ItemState::Error(message) => Some(message),
            _ => None,
        }
    }

    pub(crate) fn begin_processing(&mut self) -> bool {
        if self.state != ItemState::Queued {
            return false;
        }
        self.state = ItemState::Processing;
        true
    }

    pub(crate) fn complete(&mut self, output: OutputRef) -> bool {
        if self.state != ItemState::Processing {
            return false;
        }
        self.state = ItemState::Done(output);
        true
    }

    pub(crate) fn fail(&mut self, message: String) -> bool {
        if self.state != ItemState::Processing {
            return false;
        }
        self.state = ItemState::Error(message);
        true
    }

    /// Puts a finished item back in line; its previous output handle is dropped.
    pub(crate) fn requeue(&mut self) {
        if self.status().is_terminal() {
            self.state = ItemState::Queued;
        }
    }
}

/// Turns a picker/drop selection into queued items.
///
/// Non-image entries are skipped and only the first [`MAX_BATCH_ITEMS`]
/// accepted entries are kept. Each kept entry gets one preview handle.
pub fn build_queue(
    files: Vec<CandidateFile>,
    now_ms: u64,
    registry: &HandleRegistry,
) -> Vec<QueueItem> {
    files
        .into_iter()
        .filter(CandidateFile::is_image)
        .take(MAX_BATCH_ITEMS)
        .enumerate()
        .map(|(index, file)| QueueItem {
            id: ItemId::new(now_ms, index as u32),
            size_bytes: file.bytes.len() as u64,
            display_name: file.name,
            source: SourceRef {
                bytes: file.bytes,
                media_type: file.media_type,
                handle: registry.allocate(),
            },
            state: ItemState::Queued,
        })
        .collect()
}
