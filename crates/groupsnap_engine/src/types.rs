use std::fmt;
use std::path::PathBuf;

/// Why an item was passed over without a usable download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    InvalidUrl,
    HttpStatus(u16),
}

/// Why an attempted download did not reach disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailReason {
    Timeout,
    Network(String),
    Filesystem(String),
}

/// Terminal classification of one download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Success { bytes: u64 },
    Skipped(SkipReason),
    Failed(FailReason),
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DownloadOutcome::Success { .. })
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::InvalidUrl => write!(f, "invalid-url"),
            SkipReason::HttpStatus(code) => write!(f, "http-status:{code}"),
        }
    }
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailReason::Timeout => write!(f, "timeout"),
            FailReason::Network(msg) => write!(f, "network:{msg}"),
            FailReason::Filesystem(msg) => write!(f, "filesystem:{msg}"),
        }
    }
}

impl fmt::Display for DownloadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadOutcome::Success { bytes } => write!(f, "success ({bytes} bytes)"),
            DownloadOutcome::Skipped(reason) => write!(f, "skipped: {reason}"),
            DownloadOutcome::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Tally of a drain. `failure` includes `skipped`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub success: usize,
    pub failure: usize,
    pub skipped: usize,
}

impl DrainSummary {
    pub fn record(&mut self, outcome: &DownloadOutcome) {
        match outcome {
            DownloadOutcome::Success { .. } => self.success += 1,
            DownloadOutcome::Skipped(_) => {
                self.failure += 1;
                self.skipped += 1;
            }
            DownloadOutcome::Failed(_) => self.failure += 1,
        }
    }

    pub fn merge(&mut self, other: DrainSummary) {
        self.success += other.success;
        self.failure += other.failure;
        self.skipped += other.skipped;
    }

    pub fn total(&self) -> usize {
        self.success + self.failure
    }
}

/// Structured progress surfaced to an optional observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    GroupStarted {
        group_id: String,
        group_name: String,
        pending: usize,
        resumed: bool,
    },
    ItemStarted {
        group_id: String,
        url: String,
    },
    ItemCompleted {
        group_id: String,
        url: String,
        path: PathBuf,
        outcome: DownloadOutcome,
    },
    GroupCompleted {
        group_id: String,
        summary: DrainSummary,
    },
}
