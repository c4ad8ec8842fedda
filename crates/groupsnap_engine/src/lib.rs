//! Groupsnap engine: listing, queue persistence and concurrent downloading.
mod api;
mod download;
mod listing;
mod pipeline;
mod scheduler;
mod sink;
mod store;
mod types;

pub use api::{
    ApiSettings, ListingError, RemoteApi, RemoteAttachment, RemoteGroup, RemoteMessage,
    ReqwestRemoteApi, ACCESS_TOKEN_HEADER,
};
pub use download::{restore_modified_time, DownloadSettings, Downloader, ReqwestDownloader};
pub use listing::{build_media_list, list_groups, GroupSummary};
pub use pipeline::{Pipeline, RunConfig, RunError, RunReport};
pub use scheduler::{Scheduler, SchedulerSettings, DEFAULT_CONCURRENCY, MAX_CONCURRENCY};
pub use sink::{ChannelProgressSink, ProgressSink};
pub use store::{ensure_state_dir, QueueStore, StoreError, STORE_FILENAME};
pub use types::{DownloadOutcome, DrainSummary, FailReason, PipelineEvent, SkipReason};
