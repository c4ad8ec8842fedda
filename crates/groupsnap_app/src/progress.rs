use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use groupsnap_engine::{DownloadOutcome, PipelineEvent};

/// Prints pipeline events to stdout until every sender is dropped.
pub(crate) fn spawn_printer(rx: mpsc::Receiver<PipelineEvent>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut total = 0usize;
        let mut done = 0usize;
        while let Ok(event) = rx.recv() {
            match event {
                PipelineEvent::GroupStarted {
                    group_name,
                    pending,
                    resumed,
                    ..
                } => {
                    total = pending;
                    let mode = if resumed { "resuming" } else { "starting" };
                    println!("{mode} {group_name}: {pending} items pending");
                }
                PipelineEvent::ItemStarted { .. } => {}
                PipelineEvent::ItemCompleted { url, outcome, .. } => {
                    done += 1;
                    let tag = match outcome {
                        DownloadOutcome::Success { .. } => "ok",
                        DownloadOutcome::Skipped(_) => "skip",
                        DownloadOutcome::Failed(_) => "fail",
                    };
                    println!("[{done}/{total}] {tag} {url} ({outcome})");
                }
                PipelineEvent::GroupCompleted { .. } => {}
            }
        }
    })
}
