use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use groupsnap_core::MediaItem;
use groupsnap_logging::{snap_debug, snap_warn};
use reqwest::StatusCode;
use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::{DownloadOutcome, FailReason, SkipReason};

#[derive(Debug, Clone)]
pub struct DownloadSettings {
    /// Deadline for the response; also bounds stalls while reading the body.
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// A url must contain at least one of these to be fetched.
    pub required_domains: Vec<String>,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            required_domains: vec!["groupimg.com".to_string(), "groupme.com".to_string()],
        }
    }
}

/// Fetches one media item to a local path and classifies the outcome.
///
/// Implementations never retry and never touch the queue.
#[async_trait::async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, item: &MediaItem, destination: &Path) -> DownloadOutcome;
}

#[derive(Debug, Clone)]
pub struct ReqwestDownloader {
    settings: DownloadSettings,
    client: reqwest::Client,
}

impl ReqwestDownloader {
    pub fn new(settings: DownloadSettings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .read_timeout(settings.timeout)
            .build()?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &DownloadSettings {
        &self.settings
    }

    fn accepts(&self, url: &str) -> bool {
        !url.is_empty()
            && self
                .settings
                .required_domains
                .iter()
                .any(|domain| url.contains(domain.as_str()))
            && reqwest::Url::parse(url).is_ok()
    }

    async fn stream_into(&self, mut file: File, url: &str) -> DownloadOutcome {
        let response =
            match tokio::time::timeout(self.settings.timeout, self.client.get(url).send()).await {
                Err(_) => return DownloadOutcome::Failed(FailReason::Timeout),
                Ok(Err(err)) => return DownloadOutcome::Failed(map_reqwest_error(err)),
                Ok(Ok(response)) => response,
            };

        let status = response.status();
        if status != StatusCode::OK {
            return DownloadOutcome::Skipped(SkipReason::HttpStatus(status.as_u16()));
        }

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        loop {
            let chunk = match tokio::time::timeout(self.settings.timeout, stream.next()).await {
                Err(_) => return DownloadOutcome::Failed(FailReason::Timeout),
                Ok(None) => break,
                Ok(Some(Err(err))) => return DownloadOutcome::Failed(map_reqwest_error(err)),
                Ok(Some(Ok(chunk))) => chunk,
            };
            if let Err(err) = file.write_all(&chunk).await {
                return DownloadOutcome::Failed(FailReason::Filesystem(err.to_string()));
            }
            written += chunk.len() as u64;
        }

        if let Err(err) = file.sync_all().await {
            return DownloadOutcome::Failed(FailReason::Filesystem(err.to_string()));
        }
        DownloadOutcome::Success { bytes: written }
    }
}

#[async_trait::async_trait]
impl Downloader for ReqwestDownloader {
    async fn download(&self, item: &MediaItem, destination: &Path) -> DownloadOutcome {
        if !self.accepts(&item.url) {
            return DownloadOutcome::Skipped(SkipReason::InvalidUrl);
        }

        let (file, staged) = match open_staging(destination).await {
            Ok(parts) => parts,
            Err(err) => return DownloadOutcome::Failed(FailReason::Filesystem(err.to_string())),
        };

        let outcome = self.stream_into(file, &item.url).await;
        if !outcome.is_success() {
            snap_debug!("Discarded partial download {:?}", staged);
            return outcome;
        }
        if let Err(err) = staged.persist(destination) {
            return DownloadOutcome::Failed(FailReason::Filesystem(err.error.to_string()));
        }
        if let Some(created) = item.created {
            if let Err(err) = restore_modified_time(destination, created) {
                snap_warn!("Could not set modified time on {:?}: {}", destination, err);
            }
        }
        outcome
    }
}

/// Creates a temp file beside `destination`. The body is streamed there and
/// only renamed onto `destination` once complete; dropping the [`TempPath`]
/// removes it.
async fn open_staging(destination: &Path) -> io::Result<(File, TempPath)> {
    let parent = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    tokio::fs::create_dir_all(parent).await?;
    let staged = tempfile::Builder::new()
        .prefix(".partial-")
        .tempfile_in(parent)?;
    let (file, path) = staged.into_parts();
    Ok((File::from_std(file), path))
}

/// Sets the file's modification time to the remote creation time.
pub fn restore_modified_time(path: &Path, created: DateTime<Utc>) -> io::Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_modified(SystemTime::from(created))
}

fn map_reqwest_error(err: reqwest::Error) -> FailReason {
    if err.is_timeout() {
        return FailReason::Timeout;
    }
    FailReason::Network(err.to_string())
}
