use std::fmt;

use bytes::Bytes;

pub type RunId = u64;

/// Opaque per-item key chosen by the caller; echoed back in every event.
pub type ItemKey = String;

/// One file to send to the processing endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub key: ItemKey,
    pub file_name: String,
    pub media_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedOutput {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    ItemStarted {
        run_id: RunId,
        key: ItemKey,
    },
    ItemCompleted {
        run_id: RunId,
        key: ItemKey,
        result: Result<ProcessedOutput, ProcessError>,
    },
    RunCompleted {
        run_id: RunId,
        report: RunReport,
    },
}

/// Tally of one run, produced once every started item has settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Items never started because the run was cancelled.
    pub skipped: usize,
    pub cancelled: bool,
}

impl RunReport {
    pub fn settled(&self) -> usize {
        self.succeeded + self.failed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ProcessError {
    pub kind: FailureKind,
    pub message: String,
}

impl ProcessError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidEndpoint,
    HttpStatus(u16),
    Timeout,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Cancelled,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidEndpoint => write!(f, "invalid endpoint"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Cancelled => write!(f, "cancelled"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}
