use bytes::Bytes;

use crate::{BundleEntry, FormField, ItemId, RunId};

/// A queue item handed to the engine for one processing attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchItem {
    pub item_id: ItemId,
    pub file_name: String,
    pub media_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Process `items` in order with the given text fields.
    DispatchRun {
        run_id: RunId,
        items: Vec<DispatchItem>,
        fields: Vec<FormField>,
    },
    /// Abandon a run that is still in flight.
    CancelRun { run_id: RunId },
    /// Package every entry into one archive for download.
    ExportBundle { entries: Vec<BundleEntry> },
    /// Save a single processed output.
    SaveFile { entry: BundleEntry },
}
