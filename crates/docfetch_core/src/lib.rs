//! Docfetch core: pure worklist resolution, naming and outcome bookkeeping.
mod ledger;
mod naming;
mod outcome;
mod report;
mod worklist;

pub use ledger::{ItemState, Phase, RunLedger};
pub use naming::{
    archive_path_for, output_path, sanitize_code, short_hash, PathPlanner, ARTIFACT_EXTENSION,
};
pub use outcome::{FailureCategory, FailureKind, FetchOutcome};
pub use report::{ArchiveFailure, FailedItem, PipelineReport};
pub use worklist::{resolve_field, Record, WorkItem, CODE_ALIASES, URL_ALIASES};
