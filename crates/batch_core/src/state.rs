use batch_logging::{batch_debug, batch_warn};

use crate::bundle::{output_names, BundleEntry};
use crate::effect::DispatchItem;
use crate::handle::HandleRegistry;
use crate::item::{build_queue, CandidateFile, ItemId, OutputRef, QueueItem};
use crate::msg::ProcessedOutput;
use crate::params::ToolParams;
use crate::view_model::{overall_progress, AppViewModel, ItemRowView};

pub type RunId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Running { run_id: RunId },
}

/// The one owner of the batch queue. Every mutation is keyed by item id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    items: Vec<QueueItem>,
    params: ToolParams,
    run: RunState,
    last_run_id: RunId,
    selected: Option<ItemId>,
    registry: HandleRegistry,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: ToolParams) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    pub fn view(&self) -> AppViewModel {
        let rows = self
            .items
            .iter()
            .zip(output_names(&self.items, self.params.format()))
            .map(|(item, output_name)| ItemRowView::from_item(item, output_name))
            .collect::<Vec<_>>();
        AppViewModel {
            tool: self.params.tool_name(),
            item_count: rows.len(),
            progress: overall_progress(&self.items),
            running: self.active_run().is_some(),
            selected: self.selected,
            can_download_all: rows.iter().any(|row| row.output_uri.is_some()),
            rows,
            dirty: self.dirty,
        }
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn item(&self, item_id: ItemId) -> Option<&QueueItem> {
        self.items.iter().find(|item| item.id() == item_id)
    }

    pub fn params(&self) -> &ToolParams {
        &self.params
    }

    pub fn run_state(&self) -> RunState {
        self.run
    }

    pub fn active_run(&self) -> Option<RunId> {
        match self.run {
            RunState::Running { run_id } => Some(run_id),
            RunState::Idle => None,
        }
    }

    pub fn selected(&self) -> Option<ItemId> {
        self.selected
    }

    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    /// Returns whether the state changed since the last call, and resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Swaps in a new batch. Old handles are released before new ones exist.
    pub(crate) fn replace_queue(&mut self, files: Vec<CandidateFile>, now_ms: u64) -> usize {
        self.items.clear();
        self.items = build_queue(files, now_ms, &self.registry);
        self.selected = self.items.first().map(QueueItem::id);
        self.mark_dirty();
        self.items.len()
    }

    pub(crate) fn clear_queue(&mut self) {
        self.items.clear();
        self.selected = None;
        self.mark_dirty();
    }

    pub(crate) fn set_params(&mut self, params: ToolParams) {
        if self.params != params {
            self.params = params;
            self.mark_dirty();
        }
    }

    /// Stops tracking the active run, returning its id if there was one.
    pub(crate) fn cancel_run(&mut self) -> Option<RunId> {
        let run_id = self.active_run()?;
        self.run = RunState::Idle;
        self.mark_dirty();
        Some(run_id)
    }

    /// Starts a run over the whole queue, or over one item when `only` is set.
    ///
    /// Finished targets go back to `Queued` first. Returns `None` while a run
    /// is active or when nothing matches.
    pub(crate) fn begin_run(&mut self, only: Option<ItemId>) -> Option<(RunId, Vec<DispatchItem>)> {
        if self.active_run().is_some() {
            batch_debug!("run already active; ignoring new run request");
            return None;
        }
        let mut targets = Vec::new();
        for item in self
            .items
            .iter_mut()
            .filter(|item| only.map_or(true, |id| item.id() == id))
        {
            item.requeue();
            targets.push(DispatchItem {
                item_id: item.id(),
                file_name: item.display_name().to_string(),
                media_type: item.source().media_type.clone(),
                bytes: item.source().bytes.clone(),
            });
        }
        if targets.is_empty() {
            return None;
        }
        self.last_run_id += 1;
        let run_id = self.last_run_id;
        self.run = RunState::Running { run_id };
        self.mark_dirty();
        Some((run_id, targets))
    }

    pub(crate) fn apply_started(&mut self, run_id: RunId, item_id: ItemId) {
        if !self.is_current(run_id) {
            batch_debug!("ignoring start of {} from stale run {}", item_id, run_id);
            return;
        }
        match self.item_mut(item_id) {
            Some(item) => {
                if item.begin_processing() {
                    self.mark_dirty();
                } else {
                    batch_warn!("item {} is not queued; start ignored", item_id);
                }
            }
            None => batch_warn!("start for unknown item {}", item_id),
        }
    }

    pub(crate) fn apply_finished(
        &mut self,
        run_id: RunId,
        item_id: ItemId,
        result: Result<ProcessedOutput, String>,
    ) {
        if !self.is_current(run_id) {
            batch_debug!("ignoring result of {} from stale run {}", item_id, run_id);
            return;
        }
        let registry = self.registry.clone();
        let Some(item) = self.item_mut(item_id) else {
            batch_warn!("result for unknown item {}", item_id);
            return;
        };
        let applied = match result {
            Ok(output) => item.complete(OutputRef {
                bytes: output.bytes,
                media_type: output.media_type,
                handle: registry.allocate(),
            }),
            Err(message) => item.fail(message),
        };
        if applied {
            self.mark_dirty();
        } else {
            batch_warn!("item {} is not processing; result ignored", item_id);
        }
    }

    pub(crate) fn finish_run(&mut self, run_id: RunId) {
        if self.is_current(run_id) {
            self.run = RunState::Idle;
            self.mark_dirty();
        }
    }

    pub(crate) fn select(&mut self, item_id: ItemId) {
        if self.item(item_id).is_some() && self.selected != Some(item_id) {
            self.selected = Some(item_id);
            self.mark_dirty();
        }
    }

    pub(crate) fn output_entry(&self, item_id: ItemId) -> Option<BundleEntry> {
        let index = self.items.iter().position(|item| item.id() == item_id)?;
        let output = self.items[index].output()?;
        let mut names = output_names(&self.items, self.params.format());
        Some(BundleEntry {
            file_name: names.swap_remove(index),
            bytes: output.bytes.clone(),
        })
    }

    fn is_current(&self, run_id: RunId) -> bool {
        self.active_run() == Some(run_id)
    }

    fn item_mut(&mut self, item_id: ItemId) -> Option<&mut QueueItem> {
        self.items.iter_mut().find(|item| item.id() == item_id)
    }
}
