use std::path::PathBuf;

use docfetch_core::{FailureKind, FetchOutcome, Phase};
use engine_logging::{engine_debug, engine_info, engine_warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    PhaseStarted {
        phase: Phase,
        items: usize,
    },
    /// A record could not be turned into a work item.
    ItemRejected {
        index: usize,
        reason: FailureKind,
    },
    ItemSettled {
        index: usize,
        phase: Phase,
        outcome: FetchOutcome,
    },
    ArchiveWritten {
        path: PathBuf,
        members: usize,
    },
    ArchiveFailed {
        reason: String,
    },
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

pub struct ChannelProgressSink {
    tx: std::sync::mpsc::Sender<PipelineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: std::sync::mpsc::Sender<PipelineEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }
}

/// Writes every event to the log.
#[derive(Debug, Default)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn emit(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::PhaseStarted { phase, items } => {
                engine_info!("{:?} phase: {} item(s)", phase, items);
            }
            PipelineEvent::ItemRejected { index, reason } => {
                engine_warn!("record #{} rejected: {}", index, reason);
            }
            PipelineEvent::ItemSettled {
                index,
                phase,
                outcome,
            } => match outcome {
                FetchOutcome::Downloaded(path) => {
                    engine_info!("record #{} saved via {:?}: {:?}", index, phase, path);
                }
                FetchOutcome::Skipped(path) => {
                    engine_debug!("record #{} already present: {:?}", index, path);
                }
                FetchOutcome::Failed(kind) => {
                    engine_debug!("record #{} failed in {:?}: {}", index, phase, kind);
                }
            },
            PipelineEvent::ArchiveWritten { path, members } => {
                engine_info!("archived {} file(s) into {:?}", members, path);
            }
            PipelineEvent::ArchiveFailed { reason } => {
                engine_warn!("archive failed: {}", reason);
            }
        }
    }
}
