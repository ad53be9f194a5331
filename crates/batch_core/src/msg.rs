use bytes::Bytes;

use crate::{CandidateFile, ItemId, RunId, ToolParams};

/// Successful result of one processing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedOutput {
    pub bytes: Bytes,
    pub media_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// User picked or dropped files; replaces the current batch.
    FilesSelected {
        files: Vec<CandidateFile>,
        now_ms: u64,
    },
    /// User changed the tool settings.
    ParamsChanged(ToolParams),
    /// User clicked "Process All".
    ProcessAllClicked,
    /// User asked to process only one row.
    ProcessItemClicked { item_id: ItemId },
    /// Engine picked an item up.
    ItemStarted { run_id: RunId, item_id: ItemId },
    /// Engine settled an item, successfully or not.
    ItemFinished {
        run_id: RunId,
        item_id: ItemId,
        result: Result<ProcessedOutput, String>,
    },
    /// Engine settled every item of a run.
    RunCompleted { run_id: RunId },
    /// User selected a row for preview.
    ItemSelected { item_id: ItemId },
    /// User clicked a row's download button.
    DownloadItemClicked { item_id: ItemId },
    /// User clicked "Download All".
    DownloadAllClicked,
    /// Page is going away; release everything.
    Teardown,
    /// UI/render tick to coalesce rendering.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}
