use std::collections::VecDeque;
use std::sync::{mpsc, Mutex, PoisonError};
use std::time::Duration;

use batch_logging::batch_debug;
use tokio_util::sync::CancellationToken;

use crate::process::Processor;
use crate::{EngineEvent, FailureKind, ProcessError, ProcessedOutput, RunId, RunReport, WorkItem};

/// Default number of requests allowed in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 3;

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelProgressSink {
    tx: mpsc::Sender<EngineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// Fixed set of workers pulling items off one shared FIFO.
///
/// Items start in queue order, at most `concurrency` are in flight, and a
/// failed item never stops its siblings. [`WorkerPool::run`] returns only
/// after every started item has settled.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    concurrency: usize,
    item_timeout: Option<Duration>,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

#[derive(Debug, Default)]
struct Tally {
    succeeded: usize,
    failed: usize,
}

impl WorkerPool {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            item_timeout: None,
        }
    }

    /// Caps the time one item may take, whatever the processor does.
    pub fn with_item_timeout(mut self, timeout: Duration) -> Self {
        self.item_timeout = Some(timeout);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub async fn run(
        &self,
        run_id: RunId,
        items: Vec<WorkItem>,
        fields: &[(String, String)],
        processor: &dyn Processor,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> RunReport {
        let workers = self.concurrency.min(items.len());
        let queue = Mutex::new(VecDeque::from(items));
        batch_debug!("run {} starting {} worker(s)", run_id, workers);

        let tallies = futures_util::future::join_all(
            (0..workers).map(|_| self.worker(run_id, &queue, fields, processor, sink, cancel)),
        )
        .await;

        let skipped = queue.lock().unwrap_or_else(PoisonError::into_inner).len();
        tallies.into_iter().fold(
            RunReport {
                skipped,
                cancelled: cancel.is_cancelled(),
                ..RunReport::default()
            },
            |mut report, tally| {
                report.succeeded += tally.succeeded;
                report.failed += tally.failed;
                report
            },
        )
    }

    async fn worker(
        &self,
        run_id: RunId,
        queue: &Mutex<VecDeque<WorkItem>>,
        fields: &[(String, String)],
        processor: &dyn Processor,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Tally {
        let mut tally = Tally::default();
        while !cancel.is_cancelled() {
            let Some(item) = queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
            else {
                break;
            };

            sink.emit(EngineEvent::ItemStarted {
                run_id,
                key: item.key.clone(),
            });
            let result = self.attempt(&item, fields, processor, cancel).await;
            match &result {
                Ok(_) => tally.succeeded += 1,
                Err(err) => {
                    batch_debug!("run {} item {} failed: {}", run_id, item.key, err);
                    tally.failed += 1;
                }
            }
            sink.emit(EngineEvent::ItemCompleted {
                run_id,
                key: item.key,
                result,
            });
        }
        tally
    }

    async fn attempt(
        &self,
        item: &WorkItem,
        fields: &[(String, String)],
        processor: &dyn Processor,
        cancel: &CancellationToken,
    ) -> Result<ProcessedOutput, ProcessError> {
        let work = async {
            match self.item_timeout {
                Some(limit) => tokio::time::timeout(limit, processor.process(item, fields))
                    .await
                    .unwrap_or_else(|_| {
                        Err(ProcessError::new(
                            FailureKind::Timeout,
                            format!("no response within {limit:?}"),
                        ))
                    }),
                None => processor.process(item, fields).await,
            }
        };
        tokio::select! {
            _ = cancel.cancelled() => Err(ProcessError::new(FailureKind::Cancelled, "run cancelled")),
            result = work => result,
        }
    }
}
