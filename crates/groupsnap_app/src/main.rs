mod config;
mod progress;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{mpsc, Arc};

use anyhow::Context;
use groupsnap_engine::{ChannelProgressSink, Pipeline};
use groupsnap_logging::{snap_error, snap_info, LogDestination};
use log::LevelFilter;

fn main() -> ExitCode {
    groupsnap_logging::initialize(LogDestination::File, LevelFilter::Info);
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            snap_error!("Run failed: {:#}", err);
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<()> {
    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(config::DEFAULT_CONFIG_FILENAME));
    let config = config::load_config(&config_path)?;

    let (event_tx, event_rx) = mpsc::channel();
    let printer = progress::spawn_printer(event_rx);

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    let result = runtime.block_on(async {
        let pipeline = Pipeline::from_config(&config)
            .context("failed to set up download pipeline")?
            .with_sink(Arc::new(ChannelProgressSink::new(event_tx)));
        pipeline
            .run(config.token.as_deref(), &config.group_id)
            .await
            .context("download run aborted")
    });
    let _ = printer.join();

    let report = result?;
    snap_info!(
        "Group {} finished: {} succeeded, {} failed",
        report.group_id,
        report.summary.success,
        report.summary.failure
    );
    println!(
        "{} ({}): {} downloaded, {} failed ({} skipped){}",
        report.group_name,
        report.group_id,
        report.summary.success,
        report.summary.failure,
        report.summary.skipped,
        if report.resumed { " [resumed]" } else { "" }
    );
    Ok(())
}
