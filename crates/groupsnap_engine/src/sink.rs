use std::sync::mpsc;
use std::sync::Arc;

use crate::PipelineEvent;

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

/// Forwards events into a channel; a dropped receiver is ignored.
pub struct ChannelProgressSink {
    tx: mpsc::Sender<PipelineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: mpsc::Sender<PipelineEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }
}

pub(crate) fn emit(sink: Option<&Arc<dyn ProgressSink>>, event: PipelineEvent) {
    if let Some(sink) = sink {
        sink.emit(event);
    }
}
