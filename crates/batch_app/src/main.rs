use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context};
use batch_app::{logging, media, AppConfig, BatchSession, Cli};
use batch_core::{AppViewModel, ItemStatus, Msg, MAX_BATCH_ITEMS};
use batch_engine::EngineHandle;
use batch_logging::{batch_error, batch_info, batch_warn};
use chrono::Utc;
use clap::Parser;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            batch_error!("{:#}", err);
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let loaded = AppConfig::load(&cli.config);
    let mut config = match &loaded {
        Ok(Some(config)) => config.clone(),
        _ => AppConfig::default(),
    };
    cli.apply_overrides(&mut config);

    logging::initialize(config.log_destination, config.level_filter());
    match loaded {
        Ok(Some(_)) => batch_info!("loaded settings from {:?}", cli.config),
        Ok(None) => batch_info!("no settings at {:?}; using defaults", cli.config),
        Err(err) => batch_warn!("{}; using defaults", err),
    }

    let Some(batch) = cli.tool.batch() else {
        let path = config.save(&cli.config)?;
        println!("wrote {}", path.display());
        return Ok(ExitCode::SUCCESS);
    };

    let files = media::load_candidates(&batch.inputs)?;
    let natural = files
        .iter()
        .find(|file| file.is_image())
        .and_then(|file| media::natural_dimensions(&file.bytes));
    let params = cli
        .tool
        .params(natural)
        .context("tool has no processing settings")?;

    let engine = EngineHandle::new(config.engine_config()).context("failed to start engine")?;
    let mut session = BatchSession::new(
        engine,
        config.output_dir.clone(),
        config.bundle_filename.clone(),
    );

    session.dispatch(Msg::ParamsChanged(params))?;
    session.dispatch(Msg::FilesSelected {
        files,
        now_ms: now_ms(),
    })?;
    if session.view().item_count == 0 {
        bail!("none of the inputs is an image");
    }

    session.dispatch(Msg::ProcessAllClicked)?;
    if !session.run_until_idle(run_limit(&config))? {
        batch_warn!("run did not settle in time; exporting what finished");
    }

    let view = session.view();
    print_rows(&view);

    if cli.separate {
        for row in view.rows.iter().filter(|row| row.output_uri.is_some()) {
            session.dispatch(Msg::DownloadItemClicked {
                item_id: row.item_id,
            })?;
        }
    } else {
        session.dispatch(Msg::DownloadAllClicked)?;
    }
    for path in session.written() {
        println!("wrote {}", path.display());
    }

    let failed = view
        .rows
        .iter()
        .filter(|row| row.status != ItemStatus::Done)
        .count();
    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

fn print_rows(view: &AppViewModel) {
    println!("{} ({} items, {}%)", view.tool, view.item_count, view.progress);
    for row in &view.rows {
        match (&row.error, &row.download_name) {
            (Some(error), _) => {
                println!("  {:<32} {:>10}  error: {}", row.name, row.size_label, error)
            }
            (None, Some(download)) => {
                println!("  {:<32} {:>10}  done -> {}", row.name, row.size_label, download)
            }
            (None, None) => {
                println!("  {:<32} {:>10}  {}", row.name, row.size_label, row.status)
            }
        }
    }
}

/// Upper bound for a whole run: every item taking its full allowance in turn.
fn run_limit(config: &AppConfig) -> Duration {
    let per_item = config
        .item_timeout_secs
        .max(config.request_timeout_secs)
        .max(1);
    Duration::from_secs(per_item * MAX_BATCH_ITEMS as u64 + 5)
}

fn now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
}
