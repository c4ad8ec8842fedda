use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use groupsnap_core::{GroupState, MediaItem, MediaRules};
use groupsnap_logging::{snap_error, snap_info, snap_warn};
use tokio::task::JoinSet;

use crate::sink::emit;
use crate::{Downloader, DownloadOutcome, DrainSummary, PipelineEvent, ProgressSink, QueueStore};

pub const DEFAULT_CONCURRENCY: usize = 3;
pub const MAX_CONCURRENCY: usize = 10;

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub output_dir: PathBuf,
    /// Delay a worker waits after each completion before taking the next item.
    pub pacing: Duration,
    pub media_rules: MediaRules,
}

impl SchedulerSettings {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            pacing: Duration::from_millis(250),
            media_rules: MediaRules::default(),
        }
    }
}

/// Drains a group's queue through a bounded pool of download workers.
pub struct Scheduler {
    downloader: Arc<dyn Downloader>,
    store: Arc<QueueStore>,
    sink: Option<Arc<dyn ProgressSink>>,
    settings: SchedulerSettings,
}

struct WorkerContext {
    downloader: Arc<dyn Downloader>,
    store: Arc<QueueStore>,
    sink: Option<Arc<dyn ProgressSink>>,
    rules: Arc<MediaRules>,
    output_dir: PathBuf,
    group_id: String,
    group_dir: String,
    pacing: Duration,
}

type SharedQueue = Arc<Mutex<VecDeque<MediaItem>>>;

impl Scheduler {
    pub fn new(
        downloader: Arc<dyn Downloader>,
        store: Arc<QueueStore>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            downloader,
            store,
            sink: None,
            settings,
        }
    }

    pub fn with_sink(mut self, sink: Option<Arc<dyn ProgressSink>>) -> Self {
        self.sink = sink;
        self
    }

    /// Runs every pending item of `group` to a terminal outcome with at most
    /// `concurrency` downloads in flight, removing each item from the store as
    /// it finishes. Returns once the queue is empty and no worker is running.
    pub async fn drain(&self, group: &GroupState, concurrency: usize) -> DrainSummary {
        let concurrency = concurrency.clamp(1, MAX_CONCURRENCY);
        let queue: SharedQueue = Arc::new(Mutex::new(
            group.pending_items.iter().cloned().collect(),
        ));
        let workers = concurrency.min(group.pending_items.len());
        snap_info!(
            "Draining {} items of group {} with {} workers",
            group.pending_items.len(),
            group.group_id,
            workers
        );

        let rules = Arc::new(self.settings.media_rules.clone());
        let mut pool = JoinSet::new();
        for slot in 0..workers {
            let ctx = WorkerContext {
                downloader: self.downloader.clone(),
                store: self.store.clone(),
                sink: self.sink.clone(),
                rules: rules.clone(),
                output_dir: self.settings.output_dir.clone(),
                group_id: group.group_id.clone(),
                group_dir: group.directory_name().to_string(),
                pacing: self.settings.pacing,
            };
            pool.spawn(run_worker(slot, ctx, queue.clone()));
        }

        let mut summary = DrainSummary::default();
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(tally) => summary.merge(tally),
                Err(err) => snap_error!("Download worker aborted: {}", err),
            }
        }
        snap_info!(
            "Drained group {}: {} succeeded, {} failed ({} skipped)",
            group.group_id,
            summary.success,
            summary.failure,
            summary.skipped
        );
        summary
    }
}

fn next_item(queue: &SharedQueue) -> Option<MediaItem> {
    queue
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .pop_front()
}

/// Store writes are synchronous file I/O, so they run off the async workers.
async fn remove_from_queue(store: &Arc<QueueStore>, group_id: &str, url: &str) {
    let store = store.clone();
    let (group_id, url) = (group_id.to_string(), url.to_string());
    let removal = tokio::task::spawn_blocking(move || {
        store
            .remove_media_item(&group_id, &url)
            .map_err(|err| format!("Failed to remove {} from queue: {}", url, err))
    });
    match removal.await {
        Ok(Ok(_)) => {}
        Ok(Err(message)) => snap_error!("{}", message),
        Err(err) => snap_error!("Queue removal task aborted: {}", err),
    }
}

async fn run_worker(slot: usize, ctx: WorkerContext, queue: SharedQueue) -> DrainSummary {
    let mut tally = DrainSummary::default();
    while let Some(item) = next_item(&queue) {
        let destination = ctx
            .rules
            .resolve_path(&ctx.output_dir, &ctx.group_dir, &item);
        emit(
            ctx.sink.as_ref(),
            PipelineEvent::ItemStarted {
                group_id: ctx.group_id.clone(),
                url: item.url.clone(),
            },
        );

        let outcome = ctx.downloader.download(&item, &destination).await;
        remove_from_queue(&ctx.store, &ctx.group_id, &item.url).await;

        match &outcome {
            DownloadOutcome::Success { .. } => {
                snap_info!("[worker {}] {} -> {:?}: {}", slot, item.url, destination, outcome)
            }
            _ => snap_warn!("[worker {}] {}: {}", slot, item.url, outcome),
        }
        tally.record(&outcome);
        emit(
            ctx.sink.as_ref(),
            PipelineEvent::ItemCompleted {
                group_id: ctx.group_id.clone(),
                url: item.url,
                path: destination,
                outcome,
            },
        );

        if !ctx.pacing.is_zero() {
            tokio::time::sleep(ctx.pacing).await;
        }
    }
    tally
}
