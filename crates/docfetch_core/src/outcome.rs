use std::fmt;
use std::path::{Path, PathBuf};

/// Why an item could not be retrieved. `Display` yields the reason string
/// recorded in the run report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    MissingFields,
    InvalidUrl(String),
    HttpStatus(u16),
    Timeout(String),
    RedirectLimitExceeded(String),
    Network(String),
    NavigationTimeout { timeout_ms: u64 },
    Navigation(String),
    NotPdf,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    NoPdfFound,
    Persist(String),
}

/// Coarse grouping used to tell "got nothing" apart from "got the wrong thing".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    Input,
    Transport,
    ContentMismatch,
    Storage,
}

impl FailureKind {
    pub fn category(&self) -> FailureCategory {
        match self {
            FailureKind::MissingFields => FailureCategory::Input,
            FailureKind::InvalidUrl(_)
            | FailureKind::HttpStatus(_)
            | FailureKind::Timeout(_)
            | FailureKind::RedirectLimitExceeded(_)
            | FailureKind::Network(_)
            | FailureKind::NavigationTimeout { .. }
            | FailureKind::Navigation(_) => FailureCategory::Transport,
            FailureKind::NotPdf | FailureKind::TooLarge { .. } | FailureKind::NoPdfFound => {
                FailureCategory::ContentMismatch
            }
            FailureKind::Persist(_) => FailureCategory::Storage,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::MissingFields => write!(f, "missing product_code or url"),
            FailureKind::InvalidUrl(msg) => write!(f, "invalid url: {msg}"),
            FailureKind::HttpStatus(code) => write!(f, "http {code}"),
            FailureKind::Timeout(msg)
            | FailureKind::RedirectLimitExceeded(msg)
            | FailureKind::Network(msg)
            | FailureKind::Navigation(msg) => write!(f, "{msg}"),
            FailureKind::NavigationTimeout { timeout_ms } => {
                write!(f, "navigation timeout after {timeout_ms}ms")
            }
            FailureKind::NotPdf => write!(f, "not a PDF (headers+magic mismatch)"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::NoPdfFound => write!(f, "no PDF found"),
            FailureKind::Persist(msg) => write!(f, "write failed: {msg}"),
        }
    }
}

/// Result of one retrieval attempt for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Fetched and written during this attempt.
    Downloaded(PathBuf),
    /// The file was already on disk; nothing was fetched.
    Skipped(PathBuf),
    Failed(FailureKind),
}

impl FetchOutcome {
    pub fn is_ok(&self) -> bool {
        !matches!(self, FetchOutcome::Failed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, FetchOutcome::Skipped(_))
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            FetchOutcome::Downloaded(path) | FetchOutcome::Skipped(path) => Some(path),
            FetchOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureKind> {
        match self {
            FetchOutcome::Failed(kind) => Some(kind),
            _ => None,
        }
    }
}
