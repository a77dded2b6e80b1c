use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::feeds::FeedSource;
use crate::models::meeting::Program;

use super::normalize::Normalized;

/// What started a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    Scheduled,
    Manual,
}

impl SyncTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncTrigger::Scheduled => "scheduled",
            SyncTrigger::Manual => "manual",
        }
    }
}

impl fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    Success { records: usize },
    Error { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub name: String,
    pub program: Program,
    #[serde(flatten)]
    pub outcome: SourceOutcome,
}

impl SourceReport {
    pub fn success(source: &FeedSource, records: usize) -> Self {
        Self {
            name: source.name.clone(),
            program: source.program,
            outcome: SourceOutcome::Success { records },
        }
    }

    pub fn error(source: &FeedSource, reason: impl Into<String>) -> Self {
        Self {
            name: source.name.clone(),
            program: source.program,
            outcome: SourceOutcome::Error { reason: reason.into() },
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, SourceOutcome::Error { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgramTotals {
    pub fetched: usize,
    pub dropped: usize,
    pub duplicates: usize,
    pub saved: usize,
    pub inserted: usize,
    pub updated: usize,
}

/// Result of one sync run, returned to the admin caller and stored with the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub trigger: SyncTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_fetched: usize,
    pub dropped: usize,
    pub duplicates: usize,
    pub saved: usize,
    pub inserted: usize,
    pub updated: usize,
    pub pruned: u64,
    pub by_program: BTreeMap<Program, ProgramTotals>,
    pub sources: Vec<SourceReport>,
}

impl SyncSummary {
    pub fn new(trigger: SyncTrigger, started_at: DateTime<Utc>) -> Self {
        Self {
            trigger,
            started_at,
            finished_at: started_at,
            total_fetched: 0,
            dropped: 0,
            duplicates: 0,
            saved: 0,
            inserted: 0,
            updated: 0,
            pruned: 0,
            by_program: BTreeMap::new(),
            sources: Vec::new(),
        }
    }

    pub fn apply_normalized(&mut self, normalized: &Normalized) {
        self.total_fetched = normalized.fetched;
        self.dropped = normalized.dropped;
        self.duplicates = normalized.duplicates;
        for (program, counts) in &normalized.by_program {
            let totals = self.by_program.entry(*program).or_default();
            totals.fetched = counts.fetched;
            totals.dropped = counts.dropped;
            totals.duplicates = counts.duplicates;
        }
    }

    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.is_error()).count()
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
