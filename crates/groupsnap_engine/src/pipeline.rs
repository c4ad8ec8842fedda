use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use groupsnap_core::GroupState;
use groupsnap_logging::snap_info;
use serde::Deserialize;
use thiserror::Error;

use crate::listing::build_media_list;
use crate::scheduler::{Scheduler, SchedulerSettings, DEFAULT_CONCURRENCY, MAX_CONCURRENCY};
use crate::sink::emit;
use crate::{
    ApiSettings, DownloadSettings, Downloader, DrainSummary, ListingError, PipelineEvent,
    ProgressSink, QueueStore, RemoteApi, ReqwestDownloader, ReqwestRemoteApi, StoreError,
};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("no access token supplied and none stored")]
    MissingToken,
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Listing(#[from] ListingError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("http client setup failed: {0}")]
    Client(String),
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_pacing_millis() -> u64 {
    250
}

/// Plain configuration values for one run, typically loaded from a RON file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunConfig {
    /// Overrides (and replaces) the stored token when present.
    #[serde(default)]
    pub token: Option<String>,
    pub group_id: String,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Where the queue store lives; defaults to `output_dir`.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_pacing_millis")]
    pub pacing_millis: u64,
    #[serde(default)]
    pub api_base_url: Option<String>,
}

impl RunConfig {
    pub fn new(group_id: impl Into<String>) -> Self {
        Self {
            token: None,
            group_id: group_id.into(),
            concurrency: DEFAULT_CONCURRENCY,
            output_dir: default_output_dir(),
            state_dir: None,
            timeout_secs: default_timeout_secs(),
            pacing_millis: default_pacing_millis(),
            api_base_url: None,
        }
    }

    pub fn validate(&self) -> Result<(), RunError> {
        if self.group_id.trim().is_empty() {
            return Err(RunError::Config("group_id must not be empty".into()));
        }
        if !(1..=MAX_CONCURRENCY).contains(&self.concurrency) {
            return Err(RunError::Config(format!(
                "concurrency must be between 1 and {MAX_CONCURRENCY}, got {}",
                self.concurrency
            )));
        }
        if self.timeout_secs == 0 {
            return Err(RunError::Config("timeout_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn state_dir(&self) -> PathBuf {
        self.state_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.clone())
    }

    pub fn api_settings(&self) -> ApiSettings {
        let mut settings = ApiSettings::default();
        if let Some(base_url) = &self.api_base_url {
            settings.base_url = base_url.clone();
        }
        settings
    }

    pub fn download_settings(&self) -> DownloadSettings {
        DownloadSettings {
            timeout: Duration::from_secs(self.timeout_secs),
            ..DownloadSettings::default()
        }
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            pacing: Duration::from_millis(self.pacing_millis),
            ..SchedulerSettings::new(self.output_dir.clone())
        }
    }
}

/// What a run did for one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub group_id: String,
    pub group_name: String,
    /// True when an existing queue was found and listing was skipped.
    pub resumed: bool,
    pub summary: DrainSummary,
}

/// Resume-or-list, then drain: the whole download flow for one group.
pub struct Pipeline {
    store: Arc<QueueStore>,
    api: Arc<dyn RemoteApi>,
    scheduler: Scheduler,
    sink: Option<Arc<dyn ProgressSink>>,
    concurrency: usize,
}

impl Pipeline {
    pub fn new(
        store: Arc<QueueStore>,
        api: Arc<dyn RemoteApi>,
        downloader: Arc<dyn Downloader>,
        settings: SchedulerSettings,
        concurrency: usize,
    ) -> Self {
        Self {
            scheduler: Scheduler::new(downloader, store.clone(), settings),
            store,
            api,
            sink: None,
            concurrency,
        }
    }

    /// Builds the HTTP-backed pipeline described by `config`.
    pub fn from_config(config: &RunConfig) -> Result<Self, RunError> {
        config.validate()?;
        let store = Arc::new(QueueStore::open(&config.state_dir())?);
        let api = Arc::new(ReqwestRemoteApi::new(config.api_settings())?);
        let downloader = Arc::new(
            ReqwestDownloader::new(config.download_settings())
                .map_err(|err| RunError::Client(err.to_string()))?,
        );
        Ok(Self::new(
            store,
            api,
            downloader,
            config.scheduler_settings(),
            config.concurrency,
        ))
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.scheduler = self.scheduler.with_sink(Some(sink.clone()));
        self.sink = Some(sink);
        self
    }

    pub fn store(&self) -> &Arc<QueueStore> {
        &self.store
    }

    /// A supplied token wins and is stored; otherwise the stored token is used.
    pub fn resolve_token(&self, token: Option<&str>) -> Result<String, RunError> {
        match token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => {
                self.store.set_token(token)?;
                Ok(token.to_string())
            }
            None => self.store.get_token().ok_or(RunError::MissingToken),
        }
    }

    pub async fn run(&self, token: Option<&str>, group_id: &str) -> Result<RunReport, RunError> {
        let token = self.resolve_token(token)?;

        let (group, resumed) = match self.store.get_group(group_id) {
            Some(existing) => {
                snap_info!(
                    "Resuming group {} with {} pending items",
                    group_id,
                    existing.pending_items.len()
                );
                (existing, true)
            }
            None => {
                let listed = build_media_list(self.api.as_ref(), &token, group_id).await?;
                (self.store.create_group(listed)?, false)
            }
        };

        let summary = self.drain_group(&group, resumed).await;
        Ok(RunReport {
            group_id: group.group_id,
            group_name: group.group_name,
            resumed,
            summary,
        })
    }

    async fn drain_group(&self, group: &GroupState, resumed: bool) -> DrainSummary {
        emit(
            self.sink.as_ref(),
            PipelineEvent::GroupStarted {
                group_id: group.group_id.clone(),
                group_name: group.group_name.clone(),
                pending: group.pending_items.len(),
                resumed,
            },
        );
        let summary = if group.is_drained() {
            snap_info!("Group {} has nothing pending", group.group_id);
            DrainSummary::default()
        } else {
            self.scheduler.drain(group, self.concurrency).await
        };
        emit(
            self.sink.as_ref(),
            PipelineEvent::GroupCompleted {
                group_id: group.group_id.clone(),
                summary,
            },
        );
        summary
    }
}
