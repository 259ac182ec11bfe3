use std::path::PathBuf;

use serde::Serialize;

use crate::Record;

/// The pipeline's single structured output.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineReport {
    pub downloaded: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<FailedItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_error: Option<ArchiveFailure>,
}

impl PipelineReport {
    pub fn total(&self) -> usize {
        self.downloaded.len() + self.skipped.len() + self.failed.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedItem {
    /// The record exactly as it appeared in the worklist.
    pub item: Record,
    pub reason: String,
}

/// Archival failure; reported beside, never instead of, the item buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveFailure {
    pub ok: bool,
    pub reason: String,
    pub error: String,
}

impl ArchiveFailure {
    pub fn new(reason: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: reason.into(),
            error: error.into(),
        }
    }
}
