use batch_logging::{batch_debug, batch_info};

use crate::bundle::bundle_entries;
use crate::{AppState, Effect, ItemId, Msg};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::FilesSelected { files, now_ms } => {
            let offered = files.len();
            let mut effects = Vec::new();
            if let Some(run_id) = state.cancel_run() {
                effects.push(Effect::CancelRun { run_id });
            }
            let accepted = state.replace_queue(files, now_ms);
            batch_info!("queued {} of {} selected files", accepted, offered);
            effects
        }
        Msg::ParamsChanged(params) => {
            state.set_params(params);
            Vec::new()
        }
        Msg::ProcessAllClicked => start_run(&mut state, None),
        Msg::ProcessItemClicked { item_id } => start_run(&mut state, Some(item_id)),
        Msg::ItemStarted { run_id, item_id } => {
            state.apply_started(run_id, item_id);
            Vec::new()
        }
        Msg::ItemFinished {
            run_id,
            item_id,
            result,
        } => {
            state.apply_finished(run_id, item_id, result);
            Vec::new()
        }
        Msg::RunCompleted { run_id } => {
            state.finish_run(run_id);
            Vec::new()
        }
        Msg::ItemSelected { item_id } => {
            state.select(item_id);
            Vec::new()
        }
        Msg::DownloadItemClicked { item_id } => match state.output_entry(item_id) {
            Some(entry) => vec![Effect::SaveFile { entry }],
            None => Vec::new(),
        },
        Msg::DownloadAllClicked => {
            let entries = bundle_entries(state.items(), state.params().format());
            if entries.is_empty() {
                batch_debug!("nothing finished; skipping bundle export");
                Vec::new()
            } else {
                vec![Effect::ExportBundle { entries }]
            }
        }
        Msg::Teardown => {
            let mut effects = Vec::new();
            if let Some(run_id) = state.cancel_run() {
                effects.push(Effect::CancelRun { run_id });
            }
            state.clear_queue();
            effects
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn start_run(state: &mut AppState, only: Option<ItemId>) -> Vec<Effect> {
    let Some((run_id, items)) = state.begin_run(only) else {
        return Vec::new();
    };
    batch_info!(
        "starting run {} with {} item(s) using {}",
        run_id,
        items.len(),
        state.params().tool_name()
    );
    vec![Effect::DispatchRun {
        run_id,
        items,
        fields: state.params().form_fields(),
    }]
}
