//! Batch core: pure queue state machine and view-model helpers.
mod bundle;
mod effect;
mod handle;
mod item;
mod msg;
mod params;
mod state;
mod update;
mod view_model;

pub use bundle::{bundle_entries, output_file_name, output_names, BundleEntry};
pub use effect::{DispatchItem, Effect};
pub use handle::{DisplayHandle, HandleId, HandleRegistry};
pub use item::{
    build_queue, CandidateFile, ItemId, ItemState, ItemStatus, OutputRef, ParseItemIdError,
    QueueItem, SourceRef, MAX_BATCH_ITEMS,
};
pub use msg::{Msg, ProcessedOutput};
pub use params::{
    ConvertParams, CropBox, CropParams, Dimensions, FilterParams, Fit, FormField, Gravity,
    OutputFormat, Position, ResizeParams, ToolParams, WatermarkParams, WatermarkPlacement,
};
pub use state::{AppState, RunId, RunState};
pub use update::update;
pub use view_model::{format_bytes, overall_progress, progress_percent, AppViewModel, ItemRowView};
