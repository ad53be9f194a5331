use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use batch_core::{
    update, AppState, AppViewModel, BundleEntry, DispatchItem, Effect, FormField, ItemId, Msg,
    ProcessedOutput,
};
use batch_engine::{write_bundle, write_output, ArchiveEntry, EngineEvent, EngineHandle, WorkItem};
use batch_logging::{batch_debug, batch_info, batch_warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Owns the batch state and is the only place that applies messages to it.
///
/// Engine events are turned back into messages here, and every effect the
/// core asks for is carried out here.
pub struct BatchSession {
    state: AppState,
    engine: EngineHandle,
    output_dir: PathBuf,
    bundle_filename: String,
    written: Vec<PathBuf>,
    last_progress: Option<u8>,
}

impl BatchSession {
    pub fn new(engine: EngineHandle, output_dir: PathBuf, bundle_filename: String) -> Self {
        Self {
            state: AppState::new(),
            engine,
            output_dir,
            bundle_filename,
            written: Vec::new(),
            last_progress: None,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn view(&self) -> AppViewModel {
        self.state.view()
    }

    /// Files written by export effects so far, in order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn dispatch(&mut self, msg: Msg) -> anyhow::Result<()> {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        if self.state.consume_dirty() {
            self.report_progress();
        }
        for effect in effects {
            self.run_effect(effect)?;
        }
        Ok(())
    }

    /// Applies every engine event that is already waiting. Returns how many there were.
    pub fn pump(&mut self) -> anyhow::Result<usize> {
        let mut handled = 0;
        while let Some(event) = self.engine.try_recv() {
            self.handle_event(event)?;
            handled += 1;
        }
        Ok(handled)
    }

    /// Waits for the active run to settle. Returns `false` if `limit` ran out first.
    pub fn run_until_idle(&mut self, limit: Duration) -> anyhow::Result<bool> {
        let deadline = Instant::now() + limit;
        while self.state.active_run().is_some() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                batch_warn!("gave up waiting for run after {:?}", limit);
                return Ok(false);
            }
            if let Some(event) = self.engine.recv_timeout(remaining.min(POLL_INTERVAL)) {
                self.handle_event(event)?;
            }
        }
        Ok(true)
    }

    fn handle_event(&mut self, event: EngineEvent) -> anyhow::Result<()> {
        match event_to_msg(event) {
            Some(msg) => self.dispatch(msg),
            None => Ok(()),
        }
    }

    fn run_effect(&mut self, effect: Effect) -> anyhow::Result<()> {
        match effect {
            Effect::DispatchRun {
                run_id,
                items,
                fields,
            } => {
                batch_debug!("dispatching run {} ({} items)", run_id, items.len());
                self.engine
                    .start_run(
                        run_id,
                        items.into_iter().map(to_work_item).collect(),
                        fields.into_iter().map(FormField::into_pair).collect(),
                    )
                    .context("engine refused the run")?;
            }
            Effect::CancelRun { run_id } => {
                batch_info!("cancelling run {}", run_id);
                self.engine
                    .cancel_run(run_id)
                    .context("engine refused the cancel")?;
            }
            Effect::ExportBundle { entries } => {
                let entries: Vec<_> = entries.into_iter().map(to_archive_entry).collect();
                let summary = write_bundle(&self.output_dir, &self.bundle_filename, &entries)
                    .with_context(|| format!("failed to write {}", self.bundle_filename))?;
                if let Some(summary) = summary {
                    self.written.push(summary.output_path);
                }
            }
            Effect::SaveFile { entry } => {
                let entry = to_archive_entry(entry);
                let path = write_output(&self.output_dir, &entry)
                    .with_context(|| format!("failed to write {}", entry.name))?;
                batch_info!("saved {}", path.display());
                self.written.push(path);
            }
        }
        Ok(())
    }

    fn report_progress(&mut self) {
        let view = self.state.view();
        if view.item_count == 0 || self.last_progress == Some(view.progress) {
            return;
        }
        self.last_progress = Some(view.progress);
        batch_info!("progress {}%", view.progress);
    }
}

impl Drop for BatchSession {
    fn drop(&mut self) {
        if let Err(err) = self.dispatch(Msg::Teardown) {
            batch_warn!("teardown failed: {:#}", err);
        }
    }
}

fn to_work_item(item: DispatchItem) -> WorkItem {
    WorkItem {
        key: item.item_id.to_string(),
        file_name: item.file_name,
        media_type: item.media_type,
        bytes: item.bytes,
    }
}

fn to_archive_entry(entry: BundleEntry) -> ArchiveEntry {
    ArchiveEntry {
        name: entry.file_name,
        bytes: entry.bytes,
    }
}

fn parse_key(key: &str) -> Option<ItemId> {
    match key.parse() {
        Ok(item_id) => Some(item_id),
        Err(err) => {
            batch_warn!("dropping event with foreign key {:?}: {}", key, err);
            None
        }
    }
}

fn event_to_msg(event: EngineEvent) -> Option<Msg> {
    match event {
        EngineEvent::ItemStarted { run_id, key } => Some(Msg::ItemStarted {
            run_id,
            item_id: parse_key(&key)?,
        }),
        EngineEvent::ItemCompleted {
            run_id,
            key,
            result,
        } => {
            let item_id = parse_key(&key)?;
            let result = result
                .map(|output| ProcessedOutput {
                    bytes: output.bytes,
                    media_type: output.content_type,
                })
                .map_err(|err| {
                    batch_warn!("item {} failed: {}", item_id, err);
                    err.message
                });
            Some(Msg::ItemFinished {
                run_id,
                item_id,
                result,
            })
        }
        EngineEvent::RunCompleted { run_id, report } => {
            batch_debug!("run {} report: {:?}", run_id, report);
            Some(Msg::RunCompleted { run_id })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batch_engine::{FailureKind, ProcessError, RunReport};
    use bytes::Bytes;

    #[test]
    fn failed_item_carries_only_the_message() {
        let msg = event_to_msg(EngineEvent::ItemCompleted {
            run_id: 3,
            key: "100-1".to_string(),
            result: Err(ProcessError::new(FailureKind::HttpStatus(500), "bad format")),
        });
        assert_eq!(
            msg,
            Some(Msg::ItemFinished {
                run_id: 3,
                item_id: ItemId::new(100, 1),
                result: Err("bad format".to_string()),
            })
        );
    }

    #[test]
    fn output_content_type_becomes_media_type() {
        let msg = event_to_msg(EngineEvent::ItemCompleted {
            run_id: 1,
            key: "5-0".to_string(),
            result: Ok(batch_engine::ProcessedOutput {
                bytes: Bytes::from_static(b"x"),
                content_type: Some("image/png".to_string()),
            }),
        });
        assert_eq!(
            msg,
            Some(Msg::ItemFinished {
                run_id: 1,
                item_id: ItemId::new(5, 0),
                result: Ok(ProcessedOutput {
                    bytes: Bytes::from_static(b"x"),
                    media_type: Some("image/png".to_string()),
                }),
            })
        );
    }

    #[test]
    fn unknown_keys_are_dropped() {
        let msg = event_to_msg(EngineEvent::ItemStarted {
            run_id: 1,
            key: "not-an-id".to_string(),
        });
        assert_eq!(msg, None);
        let msg = event_to_msg(EngineEvent::RunCompleted {
            run_id: 2,
            report: RunReport::default(),
        });
        assert_eq!(msg, Some(Msg::RunCompleted { run_id: 2 }));
    }
}
