#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use groupsnap_core::MediaItem;
use groupsnap_engine::{
    DownloadOutcome, Downloader, FailReason, PipelineEvent, ProgressSink, SkipReason,
};

/// Downloader double: outcome chosen by url, tracks calls and peak concurrency.
#[derive(Default)]
pub struct FakeDownloader {
    pub delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: Mutex<Vec<(String, PathBuf)>>,
}

impl FakeDownloader {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<(String, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn distinct_urls(&self) -> HashSet<String> {
        self.calls().into_iter().map(|(url, _)| url).collect()
    }
}

#[async_trait::async_trait]
impl Downloader for FakeDownloader {
    async fn download(&self, item: &MediaItem, destination: &Path) -> DownloadOutcome {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls
            .lock()
            .unwrap()
            .push((item.url.clone(), destination.to_path_buf()));

        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if item.url.contains("missing") {
            DownloadOutcome::Skipped(SkipReason::HttpStatus(404))
        } else if item.url.contains("slow") {
            DownloadOutcome::Failed(FailReason::Timeout)
        } else {
            DownloadOutcome::Success { bytes: 3 }
        }
    }
}

#[derive(Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<PipelineEvent>>>,
}

impl RecordingSink {
    pub fn take(&self) -> Vec<PipelineEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: PipelineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn items(urls: &[&str]) -> Vec<MediaItem> {
    urls.iter()
        .enumerate()
        .map(|(i, url)| MediaItem::new(*url, Some("Ann"), None, format!("m{i}")))
        .collect()
}
