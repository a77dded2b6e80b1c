use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::feeds::{FeedFetcher, FeedSource, RawMeeting};
use crate::models::meeting::UpsertOutcome;
use crate::models::sync_run::NewSyncRun;

use super::normalize::normalize;
use super::store::MeetingStore;
use super::summary::{SourceReport, SyncSummary, SyncTrigger};
use super::SyncError;

/// Lifecycle of the orchestrator: `Idle → Running → (Completed | Failed)`,
/// and back to `Running` on the next trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Running {
        trigger: SyncTrigger,
        started_at: DateTime<Utc>,
    },
    Completed {
        summary: SyncSummary,
    },
    Failed {
        trigger: SyncTrigger,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        reason: String,
    },
}

impl SyncState {
    pub fn is_running(&self) -> bool {
        matches!(self, SyncState::Running { .. })
    }
}

/// Holds `Running` for the duration of one run. Dropping it without calling
/// `complete` or `fail` (the run future was cancelled) records a failure.
struct RunGuard<'a> {
    state: &'a Mutex<SyncState>,
    trigger: SyncTrigger,
    started_at: DateTime<Utc>,
    finished: bool,
}

impl RunGuard<'_> {
    fn complete(mut self, summary: SyncSummary) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = SyncState::Completed { summary };
        self.finished = true;
    }

    fn fail(mut self, reason: String) {
        self.set_failed(reason);
        self.finished = true;
    }

    fn set_failed(&self, reason: String) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = SyncState::Failed {
            trigger: self.trigger,
            started_at: self.started_at,
            finished_at: Utc::now(),
            reason,
        };
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            log::warn!("Sync run ({}) was cancelled before finishing", self.trigger);
            self.set_failed("Run cancelled before completion".to_string());
        }
    }
}

/// Runs fetch → normalize → persist across all configured feeds, at most one
/// run at a time.
pub struct SyncOrchestrator<S> {
    fetcher: FeedFetcher,
    sources: Vec<FeedSource>,
    store: S,
    stale_after: Option<chrono::Duration>,
    state: Mutex<SyncState>,
}

impl<S: MeetingStore> SyncOrchestrator<S> {
    pub fn new(fetcher: FeedFetcher, sources: Vec<FeedSource>, store: S) -> Self {
        Self {
            fetcher,
            sources,
            store,
            stale_after: None,
            state: Mutex::new(SyncState::Idle),
        }
    }

    /// Prune meetings not re-observed for this long after clean scheduled runs.
    pub fn with_stale_after(mut self, stale_after: Option<chrono::Duration>) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sources(&self) -> &[FeedSource] {
        &self.sources
    }

    pub fn state(&self) -> SyncState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Atomically move to `Running`, rejecting the trigger if a run is active.
    fn begin(&self, trigger: SyncTrigger) -> Result<RunGuard<'_>, SyncError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let SyncState::Running { started_at, .. } = &*state {
            return Err(SyncError::AlreadyRunning { started_at: *started_at });
        }
        let started_at = Utc::now();
        *state = SyncState::Running { trigger, started_at };
        Ok(RunGuard {
            state: &self.state,
            trigger,
            started_at,
            finished: false,
        })
    }

    /// Execute one sync run and return its summary.
    ///
    /// Feed failures are reported per source inside the summary. The run only
    /// fails when persisting meetings fails.
    pub async fn run(&self, trigger: SyncTrigger) -> Result<SyncSummary, SyncError> {
        let guard = self.begin(trigger)?;
        let started_at = guard.started_at;
        log::info!(
            "Sync run started ({}) across {} feed(s)",
            trigger,
            self.sources.len()
        );

        let mut summary = SyncSummary::new(trigger, started_at);

        let fetched = self.fetcher.fetch_all(&self.sources).await;
        let mut batches: Vec<(FeedSource, Vec<RawMeeting>)> = Vec::with_capacity(fetched.len());
        for source_fetch in fetched {
            match source_fetch.result {
                Ok(records) => {
                    summary
                        .sources
                        .push(SourceReport::success(&source_fetch.source, records.len()));
                    batches.push((source_fetch.source, records));
                }
                Err(e) => {
                    log::warn!("Feed '{}' failed: {}", source_fetch.source.name, e);
                    summary
                        .sources
                        .push(SourceReport::error(&source_fetch.source, e.to_string()));
                }
            }
        }

        let normalized = normalize(batches.iter().map(|(s, r)| (s, r.as_slice())));
        summary.apply_normalized(&normalized);
        if normalized.dropped > 0 || normalized.duplicates > 0 {
            log::info!(
                "Normalized {} records: {} without a meeting ID, {} duplicates",
                normalized.fetched,
                normalized.dropped,
                normalized.duplicates
            );
        }

        for meeting in &normalized.meetings {
            let outcome = match self.store.upsert(meeting, started_at).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let reason = format!("Failed to save meeting {}: {}", meeting.external_id, e);
                    log::error!("Sync run ({}) failed: {}", trigger, reason);
                    summary.finished_at = Utc::now();
                    self.record(&summary, Some(&reason)).await;
                    guard.fail(reason);
                    return Err(SyncError::Store(e));
                }
            };

            let totals = summary.by_program.entry(meeting.program).or_default();
            totals.saved += 1;
            summary.saved += 1;
            match outcome {
                UpsertOutcome::Inserted => {
                    totals.inserted += 1;
                    summary.inserted += 1;
                }
                UpsertOutcome::AlreadyExisted => {
                    totals.updated += 1;
                    summary.updated += 1;
                }
            }
        }

        if trigger == SyncTrigger::Scheduled && summary.failed_sources() == 0 {
            if let Some(cutoff) = self.stale_after.and_then(|d| started_at.checked_sub_signed(d)) {
                match self.store.prune_not_synced_since(cutoff).await {
                    Ok(pruned) => {
                        summary.pruned = pruned;
                        if pruned > 0 {
                            log::info!("Pruned {} stale meeting(s)", pruned);
                        }
                    }
                    Err(e) => log::error!("Stale meeting prune failed: {}", e),
                }
            }
        }

        summary.finished_at = Utc::now();
        self.record(&summary, None).await;

        if summary.failed_sources() == summary.sources.len() && !summary.sources.is_empty() {
            log::warn!("Sync run ({}): every feed failed, nothing fetched", trigger);
        }
        log::info!(
            "Sync run ({}) completed in {}ms: fetched={}, dropped={}, duplicates={}, saved={}, inserted={}, failed_feeds={}",
            trigger,
            summary.duration_ms(),
            summary.total_fetched,
            summary.dropped,
            summary.duplicates,
            summary.saved,
            summary.inserted,
            summary.failed_sources()
        );

        guard.complete(summary.clone());
        Ok(summary)
    }

    /// Write the run to history. A history failure is logged, not propagated.
    async fn record(&self, summary: &SyncSummary, error: Option<&str>) {
        let run = NewSyncRun {
            trigger: summary.trigger.as_str().to_string(),
            status: if error.is_some() { "failed" } else { "completed" }.to_string(),
            started_at: summary.started_at,
            finished_at: summary.finished_at,
            total_fetched: summary.total_fetched as i64,
            saved: summary.saved as i64,
            inserted: summary.inserted as i64,
            error: error.map(str::to_string),
            summary: serde_json::to_value(summary).ok(),
        };
        if let Err(e) = self.store.record_run(&run).await {
            log::error!("Failed to record sync run: {}", e);
        }
    }
}
