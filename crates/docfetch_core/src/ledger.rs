use std::path::PathBuf;

use crate::{FailedItem, FailureKind, FetchOutcome, PipelineReport, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Concurrent direct fetch over the whole worklist.
    Direct,
    /// Sequential render-based retry of what `Direct` left unresolved.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    /// Direct fetch failed; the reason is kept for the final report.
    AwaitingFallback(FailureKind),
    Downloaded(PathBuf),
    Skipped(PathBuf),
    Failed(FailureKind),
}

impl ItemState {
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            ItemState::Downloaded(_) | ItemState::Skipped(_) | ItemState::Failed(_)
        )
    }
}

/// Per-run classification of every worklist record.
///
/// Each record moves `Pending -> (AwaitingFallback ->) final` exactly once;
/// transitions out of a final state are refused, so no record can land in
/// more than one report bucket.
#[derive(Debug)]
pub struct RunLedger {
    records: Vec<Record>,
    states: Vec<ItemState>,
    settled: Vec<usize>,
}

impl RunLedger {
    pub fn new(records: Vec<Record>) -> Self {
        let states = vec![ItemState::Pending; records.len()];
        Self {
            records,
            states,
            settled: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, index: usize) -> &Record {
        &self.records[index]
    }

    pub fn state(&self, index: usize) -> &ItemState {
        &self.states[index]
    }

    /// Input error: the record never reaches any phase.
    pub fn reject(&mut self, index: usize, kind: FailureKind) -> bool {
        if self.states[index] != ItemState::Pending {
            return false;
        }
        self.finish(index, ItemState::Failed(kind));
        true
    }

    /// Apply the outcome of `phase` for `index`. Returns `false` when the
    /// record is not in a state that phase may change.
    pub fn settle(&mut self, index: usize, phase: Phase, outcome: FetchOutcome) -> bool {
        let allowed = match (phase, &self.states[index]) {
            (Phase::Direct, ItemState::Pending) => true,
            (Phase::Fallback, ItemState::AwaitingFallback(_)) => true,
            _ => false,
        };
        if !allowed {
            return false;
        }
        match (phase, outcome) {
            (_, FetchOutcome::Downloaded(path)) => self.finish(index, ItemState::Downloaded(path)),
            (_, FetchOutcome::Skipped(path)) => self.finish(index, ItemState::Skipped(path)),
            (Phase::Direct, FetchOutcome::Failed(kind)) => {
                self.states[index] = ItemState::AwaitingFallback(kind);
            }
            (Phase::Fallback, FetchOutcome::Failed(kind)) => {
                self.finish(index, ItemState::Failed(kind));
            }
        }
        true
    }

    /// Records waiting for the fallback phase, in worklist order, with their
    /// direct-fetch failure.
    pub fn awaiting_fallback(&self) -> Vec<(usize, FailureKind)> {
        self.states
            .iter()
            .enumerate()
            .filter_map(|(index, state)| match state {
                ItemState::AwaitingFallback(kind) => Some((index, kind.clone())),
                _ => None,
            })
            .collect()
    }

    /// Close out anything the fallback phase did not (or could not) handle,
    /// keeping the last known reason.
    pub fn finalize_unresolved(&mut self) {
        for index in 0..self.states.len() {
            match &self.states[index] {
                ItemState::AwaitingFallback(kind) => {
                    let kind = kind.clone();
                    self.finish(index, ItemState::Failed(kind));
                }
                ItemState::Pending => {
                    self.finish(index, ItemState::Failed(FailureKind::NoPdfFound));
                }
                _ => {}
            }
        }
    }

    /// Buckets in settlement order. Archive fields are left empty.
    pub fn into_report(mut self) -> PipelineReport {
        self.finalize_unresolved();
        let mut report = PipelineReport::default();
        for index in self.settled {
            match &self.states[index] {
                ItemState::Downloaded(path) => report.downloaded.push(path.clone()),
                ItemState::Skipped(path) => report.skipped.push(path.clone()),
                ItemState::Failed(kind) => report.failed.push(FailedItem {
                    item: self.records[index].clone(),
                    reason: kind.to_string(),
                }),
                ItemState::Pending | ItemState::AwaitingFallback(_) => {}
            }
        }
        report
    }

    fn finish(&mut self, index: usize, state: ItemState) {
        debug_assert!(state.is_final());
        self.states[index] = state;
        self.settled.push(index);
    }
}
