use std::collections::HashMap;
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use batch_logging::{batch_debug, batch_info};
use tokio_util::sync::CancellationToken;

use crate::pool::{ChannelProgressSink, WorkerPool, DEFAULT_CONCURRENCY};
use crate::process::{Processor, ProcessorSettings, ReqwestProcessor};
use crate::{EngineEvent, ProcessError, RunId, WorkItem};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub processor: ProcessorSettings,
    pub concurrency: usize,
    /// Outer bound per item, on top of the HTTP client's own timeout.
    pub item_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            processor: ProcessorSettings::default(),
            concurrency: DEFAULT_CONCURRENCY,
            item_timeout: Some(Duration::from_secs(90)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to start engine: {0}")]
    Startup(#[from] std::io::Error),
    #[error("processor setup failed: {0}")]
    Processor(#[from] ProcessError),
    #[error("engine thread is no longer running")]
    Disconnected,
}

enum EngineCommand {
    StartRun {
        run_id: RunId,
        items: Vec<WorkItem>,
        fields: Vec<(String, String)>,
    },
    CancelRun {
        run_id: RunId,
    },
}

/// Front door to the background runtime that executes runs.
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: Arc<Mutex<mpsc::Receiver<EngineEvent>>>,
}

impl EngineHandle {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let processor = Arc::new(ReqwestProcessor::new(config.processor.clone())?);
        Self::with_processor(config, processor)
    }

    pub fn with_processor(
        config: EngineConfig,
        processor: Arc<dyn Processor>,
    ) -> Result<Self, EngineError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("image-batch-worker")
            .build()?;
        let mut pool = WorkerPool::new(config.concurrency);
        if let Some(timeout) = config.item_timeout {
            pool = pool.with_item_timeout(timeout);
        }

        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        thread::Builder::new()
            .name("image-batch-engine".to_string())
            .spawn(move || command_loop(runtime, cmd_rx, event_tx, pool, processor))?;

        Ok(Self {
            cmd_tx,
            event_rx: Arc::new(Mutex::new(event_rx)),
        })
    }

    pub fn start_run(
        &self,
        run_id: RunId,
        items: Vec<WorkItem>,
        fields: Vec<(String, String)>,
    ) -> Result<(), EngineError> {
        self.cmd_tx
            .send(EngineCommand::StartRun {
                run_id,
                items,
                fields,
            })
            .map_err(|_| EngineError::Disconnected)
    }

    pub fn cancel_run(&self, run_id: RunId) -> Result<(), EngineError> {
        self.cmd_tx
            .send(EngineCommand::CancelRun { run_id })
            .map_err(|_| EngineError::Disconnected)
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        lock(&self.event_rx).try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        lock(&self.event_rx).recv_timeout(timeout).ok()
    }
}

type ActiveRuns = Arc<Mutex<HashMap<RunId, CancellationToken>>>;

fn command_loop(
    runtime: tokio::runtime::Runtime,
    cmd_rx: mpsc::Receiver<EngineCommand>,
    event_tx: mpsc::Sender<EngineEvent>,
    pool: WorkerPool,
    processor: Arc<dyn Processor>,
) {
    let active: ActiveRuns = Arc::default();

    while let Ok(command) = cmd_rx.recv() {
        match command {
            EngineCommand::StartRun {
                run_id,
                items,
                fields,
            } => {
                let token = CancellationToken::new();
                lock(&active).insert(run_id, token.clone());
                let pool = pool.clone();
                let processor = processor.clone();
                let event_tx = event_tx.clone();
                let active = active.clone();
                runtime.spawn(async move {
                    let sink = ChannelProgressSink::new(event_tx.clone());
                    let report = pool
                        .run(run_id, items, &fields, processor.as_ref(), &sink, &token)
                        .await;
                    lock(&active).remove(&run_id);
                    batch_info!(
                        "run {} settled: {} ok, {} failed, {} skipped{}",
                        run_id,
                        report.succeeded,
                        report.failed,
                        report.skipped,
                        if report.cancelled { " (cancelled)" } else { "" }
                    );
                    let _ = event_tx.send(EngineEvent::RunCompleted { run_id, report });
                });
            }
            EngineCommand::CancelRun { run_id } => {
                if let Some(token) = lock(&active).remove(&run_id) {
                    batch_debug!("cancelling run {}", run_id);
                    token.cancel();
                }
            }
        }
    }

    // Every handle is gone; nobody is left to read results.
    for token in lock(&active).values() {
        token.cancel();
    }
    runtime.shutdown_timeout(Duration::from_secs(1));
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
