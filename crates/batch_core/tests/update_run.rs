use std::sync::Once;

use batch_core::{
    update, AppState, BundleEntry, CandidateFile, ConvertParams, Effect, ItemId, ItemStatus, Msg,
    OutputFormat, ProcessedOutput, ResizeParams, RunId, ToolParams,
};
use bytes::Bytes;
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(batch_logging::initialize_for_tests);
}

fn png(name: &str) -> CandidateFile {
    CandidateFile::new(name, "image/png", format!("src:{name}").into_bytes())
}

fn queued_state(names: &[&str]) -> AppState {
    let files = names.iter().map(|name| png(name)).collect();
    let (state, _) = update(AppState::new(), Msg::FilesSelected { files, now_ms: 100 });
    state
}

fn id(index: u32) -> ItemId {
    ItemId::new(100, index)
}

fn process_all(state: AppState) -> (AppState, RunId) {
    let (state, effects) = update(state, Msg::ProcessAllClicked);
    match effects.as_slice() {
        [Effect::DispatchRun { run_id, .. }] => (state, *run_id),
        other => panic!("expected one dispatch effect, got {other:?}"),
    }
}

fn started(state: AppState, run_id: RunId, item: u32) -> AppState {
    update(
        state,
        Msg::ItemStarted {
            run_id,
            item_id: id(item),
        },
    )
    .0
}

fn succeeded(state: AppState, run_id: RunId, item: u32, body: &'static [u8]) -> AppState {
    update(
        state,
        Msg::ItemFinished {
            run_id,
            item_id: id(item),
            result: Ok(ProcessedOutput {
                bytes: Bytes::from_static(body),
                media_type: Some("image/jpeg".to_string()),
            }),
        },
    )
    .0
}

fn failed(state: AppState, run_id: RunId, item: u32, message: &str) -> AppState {
    update(
        state,
        Msg::ItemFinished {
            run_id,
            item_id: id(item),
            result: Err(message.to_string()),
        },
    )
    .0
}

fn statuses(state: &AppState) -> Vec<ItemStatus> {
    state.items().iter().map(|item| item.status()).collect()
}

#[test]
fn process_all_dispatches_every_item_in_queue_order() {
    init_logging();
    let state = queued_state(&["a.png", "b.png", "c.png"]);
    let state = update(
        state,
        Msg::ParamsChanged(ToolParams::Convert(ConvertParams {
            format: OutputFormat::Jpeg,
            quality: 70,
            strip: false,
        })),
    )
    .0;

    let (state, effects) = update(state, Msg::ProcessAllClicked);

    let Effect::DispatchRun {
        run_id,
        items,
        fields,
    } = &effects[0]
    else {
        panic!("expected dispatch, got {effects:?}");
    };
    assert_eq!(*run_id, 1);
    let order: Vec<_> = items.iter().map(|item| item.item_id).collect();
    assert_eq!(order, vec![id(0), id(1), id(2)]);
    assert_eq!(items[1].file_name, "b.png");
    assert_eq!(items[1].bytes, Bytes::from_static(b"src:b.png"));
    let pairs: Vec<_> = fields.iter().cloned().map(|f| f.into_pair()).collect();
    assert_eq!(
        pairs,
        vec![
            ("format".to_string(), "jpeg".to_string()),
            ("quality".to_string(), "70".to_string()),
            ("strip".to_string(), "false".to_string()),
        ]
    );
    assert!(state.view().running);
    assert_eq!(statuses(&state), vec![ItemStatus::Queued; 3]);
}

#[test]
fn item_walks_queued_processing_done() {
    init_logging();
    let (state, run_id) = process_all(queued_state(&["a.png"]));

    let mut state = started(state, run_id, 0);
    assert_eq!(statuses(&state), vec![ItemStatus::Processing]);
    assert_eq!(state.view().progress, 50);
    assert!(state.consume_dirty());

    let state = succeeded(state, run_id, 0, b"out");
    let item = &state.items()[0];
    assert_eq!(item.status(), ItemStatus::Done);
    assert_eq!(item.output().unwrap().bytes, Bytes::from_static(b"out"));
    assert_eq!(item.error_message(), None);
    assert_eq!(state.view().progress, 100);
    // One source handle and one output handle.
    assert_eq!(state.registry().live_count(), 2);
}

#[test]
fn failure_keeps_message_and_no_output() {
    init_logging();
    let (state, run_id) = process_all(queued_state(&["a.png", "b.png"]));
    let state = started(state, run_id, 0);
    let state = failed(state, run_id, 0, "bad format");

    let item = &state.items()[0];
    assert_eq!(item.status(), ItemStatus::Error);
    assert_eq!(item.error_message(), Some("bad format"));
    assert!(item.output().is_none());
    assert_eq!(state.items()[1].status(), ItemStatus::Queued);
}

#[test]
fn status_never_moves_backwards() {
    init_logging();
    let (state, run_id) = process_all(queued_state(&["a.png"]));

    // A result before the start is ignored.
    let state = succeeded(state, run_id, 0, b"early");
    assert_eq!(statuses(&state), vec![ItemStatus::Queued]);

    let state = started(state, run_id, 0);
    let state = started(state, run_id, 0);
    assert_eq!(statuses(&state), vec![ItemStatus::Processing]);

    let state = failed(state, run_id, 0, "boom");
    let state = succeeded(state, run_id, 0, b"late");
    let state = started(state, run_id, 0);
    assert_eq!(statuses(&state), vec![ItemStatus::Error]);
    assert_eq!(state.items()[0].error_message(), Some("boom"));
    assert!(state.items()[0].output().is_none());
}

#[test]
fn second_process_all_is_ignored_while_running() {
    init_logging();
    let (state, _run_id) = process_all(queued_state(&["a.png"]));

    let (state, effects) = update(state, Msg::ProcessAllClicked);
    assert!(effects.is_empty());
    assert_eq!(state.active_run(), Some(1));
}

#[test]
fn process_all_on_empty_queue_does_nothing() {
    init_logging();
    let (state, effects) = update(AppState::new(), Msg::ProcessAllClicked);
    assert!(effects.is_empty());
    assert_eq!(state.active_run(), None);
}

#[test]
fn rerun_requeues_and_releases_previous_outputs() {
    init_logging();
    let (state, run_id) = process_all(queued_state(&["a.png", "b.png"]));
    let state = started(state, run_id, 0);
    let state = succeeded(state, run_id, 0, b"one");
    let state = started(state, run_id, 1);
    let state = failed(state, run_id, 1, "nope");
    let (state, _) = update(state, Msg::RunCompleted { run_id });
    assert_eq!(state.registry().live_count(), 3);

    let (state, second_run) = process_all(state);

    assert_eq!(second_run, 2);
    assert_eq!(statuses(&state), vec![ItemStatus::Queued, ItemStatus::Queued]);
    assert_eq!(state.registry().live_count(), 2);
}

#[test]
fn stale_run_events_are_ignored_after_new_selection() {
    init_logging();
    let (state, run_id) = process_all(queued_state(&["a.png"]));
    let state = started(state, run_id, 0);

    let (state, effects) = update(
        state,
        Msg::FilesSelected {
            files: vec![png("a.png")],
            now_ms: 100,
        },
    );
    assert_eq!(effects, vec![Effect::CancelRun { run_id }]);
    assert_eq!(state.active_run(), None);

    // Same item id, but the run it belonged to is gone.
    let state = succeeded(state, run_id, 0, b"ghost");
    assert_eq!(statuses(&state), vec![ItemStatus::Queued]);
}

#[test]
fn mixed_results_complete_the_run_and_progress_hits_the_expected_steps() {
    init_logging();
    let (state, run_id) = process_all(queued_state(&["a.png", "b.png", "c.png"]));
    assert_eq!(state.view().progress, 0);

    let state = started(state, run_id, 0);
    let state = started(state, run_id, 1);
    let state = started(state, run_id, 2);
    assert_eq!(state.view().progress, 50);

    let state = succeeded(state, run_id, 0, b"a");
    // done=1, processing=2 of 3.
    assert_eq!(state.view().progress, 67);

    let state = failed(state, run_id, 1, "bad format");
    // done=1, processing=1 of 3.
    assert_eq!(state.view().progress, 50);

    let state = succeeded(state, run_id, 2, b"c");
    let (state, _) = update(state, Msg::RunCompleted { run_id });

    assert_eq!(
        statuses(&state),
        vec![ItemStatus::Done, ItemStatus::Error, ItemStatus::Done]
    );
    assert_eq!(state.view().progress, 67);
    assert!(!state.view().running);
    assert_eq!(state.view().rows[1].error.as_deref(), Some("bad format"));
}

#[test]
fn download_all_exports_only_done_items_with_mapped_names() {
    init_logging();
    let state = queued_state(&["photo.png", "broken.png", "other.gif"]);
    let state = update(
        state,
        Msg::ParamsChanged(ToolParams::Resize(ResizeParams {
            format: OutputFormat::Jpeg,
            ..ResizeParams::default()
        })),
    )
    .0;
    let (state, run_id) = process_all(state);
    let state = started(state, run_id, 0);
    let state = started(state, run_id, 1);
    let state = started(state, run_id, 2);
    let state = succeeded(state, run_id, 0, b"first");
    let state = failed(state, run_id, 1, "bad format");
    let state = succeeded(state, run_id, 2, b"third");

    let (_state, effects) = update(state, Msg::DownloadAllClicked);

    assert_eq!(
        effects,
        vec![Effect::ExportBundle {
            entries: vec![
                BundleEntry {
                    file_name: "photo.jpg".to_string(),
                    bytes: Bytes::from_static(b"first"),
                },
                BundleEntry {
                    file_name: "other.jpg".to_string(),
                    bytes: Bytes::from_static(b"third"),
                },
            ]
        }]
    );
}

#[test]
fn download_all_without_done_items_is_a_noop() {
    init_logging();
    let (state, run_id) = process_all(queued_state(&["a.png"]));
    let state = started(state, run_id, 0);
    let state = failed(state, run_id, 0, "nope");

    let (state, effects) = update(state, Msg::DownloadAllClicked);
    assert!(effects.is_empty());
    assert!(!state.view().can_download_all);
}

#[test]
fn single_item_run_leaves_siblings_alone() {
    init_logging();
    let (state, run_id) = process_all(queued_state(&["a.png", "b.png"]));
    let state = started(state, run_id, 0);
    let state = succeeded(state, run_id, 0, b"a");
    let state = started(state, run_id, 1);
    let state = failed(state, run_id, 1, "timeout");
    let (state, _) = update(state, Msg::RunCompleted { run_id });

    let (state, effects) = update(state, Msg::ProcessItemClicked { item_id: id(1) });

    let Effect::DispatchRun { items, .. } = &effects[0] else {
        panic!("expected dispatch, got {effects:?}");
    };
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].item_id, id(1));
    assert_eq!(statuses(&state), vec![ItemStatus::Done, ItemStatus::Queued]);
}

#[test]
fn download_item_saves_one_output() {
    init_logging();
    let (state, run_id) = process_all(queued_state(&["a.png"]));
    let state = started(state, run_id, 0);
    let state = succeeded(state, run_id, 0, b"a");

    let (state, effects) = update(state, Msg::DownloadItemClicked { item_id: id(0) });
    assert_eq!(
        effects,
        vec![Effect::SaveFile {
            entry: BundleEntry {
                file_name: "a.png".to_string(),
                bytes: Bytes::from_static(b"a"),
            }
        }]
    );
    let row = &state.view().rows[0];
    assert_eq!(row.download_name.as_deref(), Some("a.png"));
    assert!(row.output_uri.as_deref().unwrap().starts_with("blob:image-batch/"));
}

#[test]
fn same_named_inputs_get_distinct_download_names_everywhere() {
    init_logging();
    let (state, run_id) = process_all(queued_state(&["a.png", "a.png"]));
    let state = started(state, run_id, 0);
    let state = succeeded(state, run_id, 0, b"first");
    let state = started(state, run_id, 1);
    let state = succeeded(state, run_id, 1, b"second");

    let names: Vec<_> = state
        .view()
        .rows
        .iter()
        .map(|row| row.download_name.clone())
        .collect();
    assert_eq!(
        names,
        vec![Some("a.png".to_string()), Some("a (2).png".to_string())]
    );

    let (state, effects) = update(state, Msg::DownloadItemClicked { item_id: id(1) });
    assert_eq!(
        effects,
        vec![Effect::SaveFile {
            entry: BundleEntry {
                file_name: "a (2).png".to_string(),
                bytes: Bytes::from_static(b"second"),
            }
        }]
    );

    let (_state, effects) = update(state, Msg::DownloadAllClicked);
    let Effect::ExportBundle { entries } = &effects[0] else {
        panic!("expected export, got {effects:?}");
    };
    let bundled: Vec<_> = entries.iter().map(|e| e.file_name.as_str()).collect();
    assert_eq!(bundled, vec!["a.png", "a (2).png"]);
}

#[test]
fn selecting_rows_updates_selection() {
    init_logging();
    let state = queued_state(&["a.png", "b.png"]);
    assert_eq!(state.view().selected, Some(id(0)));

    let (state, _) = update(state, Msg::ItemSelected { item_id: id(1) });
    assert_eq!(state.view().selected, Some(id(1)));

    let (state, _) = update(
        state,
        Msg::ItemSelected {
            item_id: ItemId::new(1, 9),
        },
    );
    assert_eq!(state.view().selected, Some(id(1)));
}
