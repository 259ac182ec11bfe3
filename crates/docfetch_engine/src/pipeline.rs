//! Two-phase retrieval over a worklist.
//!
//! Phase 1 runs every item through [`DirectFetcher`] under the
//! [`ConcurrencyLimiter`] and waits for all of them. Phase 2 retries what is
//! left, one item at a time, through a single render session. Nothing is
//! retried beyond that. The downloaded files are then archived.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use docfetch_core::{
    archive_path_for, ArchiveFailure, FetchOutcome, PathPlanner, Phase, PipelineReport, Record,
    RunLedger, WorkItem,
};
use engine_logging::{engine_info, engine_warn};
use futures_util::future::join_all;

use crate::archive::{archive, ArchiveOutcome};
use crate::render::{NavigateOptions, RenderFallbackFetcher, SessionProvider};
use crate::{ConcurrencyLimiter, DirectFetcher, Fetcher, LogProgressSink, PipelineEvent, ProgressSink};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub dest_dir: PathBuf,
    pub concurrency: usize,
    pub navigation: NavigateOptions,
    /// Bundle downloads into `{parent(dest)}/{basename(dest)}.zip`.
    pub archive: bool,
}

impl PipelineSettings {
    pub fn new(dest_dir: impl Into<PathBuf>, navigation: NavigateOptions) -> Self {
        Self {
            dest_dir: dest_dir.into(),
            concurrency: ConcurrencyLimiter::DEFAULT_MAX,
            navigation,
            archive: true,
        }
    }

    pub fn archive_path(&self) -> PathBuf {
        archive_path_for(&self.dest_dir)
    }
}

/// A resolved record with its planned output path.
struct PlannedItem {
    item: WorkItem,
    out_path: PathBuf,
}

pub struct Pipeline {
    settings: PipelineSettings,
    direct: DirectFetcher,
    fallback: RenderFallbackFetcher,
    limiter: ConcurrencyLimiter,
    sink: Arc<dyn ProgressSink>,
}

impl Pipeline {
    pub fn new(settings: PipelineSettings, fetcher: Arc<dyn Fetcher>) -> Self {
        let direct = DirectFetcher::new(fetcher);
        let fallback = RenderFallbackFetcher::new(direct.clone(), settings.navigation);
        let limiter = ConcurrencyLimiter::new(settings.concurrency);
        Self {
            settings,
            direct,
            fallback,
            limiter,
            sink: Arc::new(LogProgressSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Run both phases over `records` and archive the results.
    ///
    /// Without a session provider the fallback phase is skipped and the
    /// unresolved items keep their direct-fetch reason.
    pub async fn run(
        &self,
        records: Vec<Record>,
        sessions: Option<&dyn SessionProvider>,
    ) -> PipelineReport {
        let mut ledger = RunLedger::new(records);
        let plan = self.plan(&mut ledger);

        self.run_direct_phase(&plan, &mut ledger).await;
        self.run_fallback_phase(&plan, &mut ledger, sessions).await;

        let mut report = ledger.into_report();
        if self.settings.archive {
            self.archive_downloads(&mut report).await;
        }
        engine_info!(
            "run finished: {} downloaded, {} skipped, {} failed",
            report.downloaded.len(),
            report.skipped.len(),
            report.failed.len()
        );
        report
    }

    /// Resolve every record; input failures are settled here and never fetched.
    fn plan(&self, ledger: &mut RunLedger) -> Vec<Option<PlannedItem>> {
        let mut planner = PathPlanner::new(&self.settings.dest_dir);
        (0..ledger.len())
            .map(|index| match WorkItem::from_record(ledger.record(index)) {
                Ok(item) => {
                    let out_path = planner.plan(&item.code);
                    Some(PlannedItem { item, out_path })
                }
                Err(reason) => {
                    ledger.reject(index, reason.clone());
                    self.sink.emit(PipelineEvent::ItemRejected { index, reason });
                    None
                }
            })
            .collect()
    }

    async fn run_direct_phase(&self, plan: &[Option<PlannedItem>], ledger: &mut RunLedger) {
        let admitted: Vec<(usize, &PlannedItem)> = plan
            .iter()
            .enumerate()
            .filter_map(|(index, planned)| planned.as_ref().map(|p| (index, p)))
            .collect();
        self.sink.emit(PipelineEvent::PhaseStarted {
            phase: Phase::Direct,
            items: admitted.len(),
        });

        // Repeats of a path wait for its first claimant, so they find the file.
        let mut claimed = HashSet::new();
        let (first, repeats): (Vec<_>, Vec<_>) = admitted
            .into_iter()
            .partition(|&(_, planned)| claimed.insert(planned.out_path.as_path()));

        for wave in [first, repeats] {
            // join_all polls in submission order, so permits queue in that order too.
            let tasks = wave.into_iter().map(|(index, planned)| async move {
                let outcome = self
                    .limiter
                    .run(self.direct.fetch(&planned.item.url, &planned.out_path))
                    .await;
                (index, outcome)
            });
            for (index, outcome) in join_all(tasks).await {
                self.settle(ledger, index, Phase::Direct, outcome);
            }
        }
    }

    async fn run_fallback_phase(
        &self,
        plan: &[Option<PlannedItem>],
        ledger: &mut RunLedger,
        sessions: Option<&dyn SessionProvider>,
    ) {
        let pending = ledger.awaiting_fallback();
        if pending.is_empty() {
            return;
        }
        let Some(provider) = sessions else {
            engine_info!(
                "no render session configured; {} item(s) keep their direct-fetch failure",
                pending.len()
            );
            return;
        };
        let mut session = match provider.open().await {
            Ok(session) => session,
            Err(err) => {
                engine_warn!("could not open render session: {}", err);
                return;
            }
        };

        self.sink.emit(PipelineEvent::PhaseStarted {
            phase: Phase::Fallback,
            items: pending.len(),
        });
        for (index, prior) in pending {
            let Some(planned) = plan.get(index).and_then(Option::as_ref) else {
                continue;
            };
            let outcome = self
                .fallback
                .fetch_via_render(
                    session.as_mut(),
                    &planned.item.url,
                    &planned.out_path,
                    Some(&prior),
                )
                .await;
            self.settle(ledger, index, Phase::Fallback, outcome);
        }

        if let Err(err) = session.close().await {
            engine_warn!("closing render session failed: {}", err);
        }
    }

    fn settle(
        &self,
        ledger: &mut RunLedger,
        index: usize,
        phase: Phase,
        outcome: FetchOutcome,
    ) {
        if ledger.settle(index, phase, outcome.clone()) {
            self.sink.emit(PipelineEvent::ItemSettled {
                index,
                phase,
                outcome,
            });
        } else {
            engine_warn!("record #{} already settled; {:?} result ignored", index, phase);
        }
    }

    async fn archive_downloads(&self, report: &mut PipelineReport) {
        let zip_path = self.settings.archive_path();
        match archive(&report.downloaded, &zip_path).await {
            ArchiveOutcome::Written { path, members } => {
                self.sink.emit(PipelineEvent::ArchiveWritten {
                    path: path.clone(),
                    members: members.len(),
                });
                report.zip = Some(path);
            }
            ArchiveOutcome::NoFiles => {
                engine_info!("nothing downloaded; {:?} not written", zip_path);
            }
            ArchiveOutcome::Failed(err) => {
                self.sink.emit(PipelineEvent::ArchiveFailed {
                    reason: err.to_string(),
                });
                report.zip_error = Some(ArchiveFailure::new(err.reason(), err.to_string()));
            }
        }
    }
}
