//! Batch engine: processing requests, bounded dispatch and bundle export.
mod engine;
mod export;
mod persist;
mod pool;
mod process;
mod types;

pub use engine::{EngineConfig, EngineError, EngineHandle};
pub use export::{
    build_bundle, write_bundle, write_output, ArchiveEntry, ExportError, ExportSummary,
    DEFAULT_BUNDLE_FILENAME,
};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use pool::{ChannelProgressSink, ProgressSink, WorkerPool, DEFAULT_CONCURRENCY};
pub use process::{
    error_message_from_body, Processor, ProcessorSettings, ReqwestProcessor,
    FALLBACK_ERROR_MESSAGE,
};
pub use types::{
    EngineEvent, FailureKind, ItemKey, ProcessError, ProcessedOutput, RunId, RunReport, WorkItem,
};
