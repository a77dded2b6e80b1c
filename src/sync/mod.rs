pub mod normalize;
pub mod orchestrator;
pub mod scheduler;
pub mod store;
pub mod summary;

use std::fmt;

use chrono::{DateTime, Utc};

pub use orchestrator::{SyncOrchestrator, SyncState};
pub use store::{MeetingStore, PgMeetingStore};
pub use summary::{ProgramTotals, SourceOutcome, SourceReport, SyncSummary, SyncTrigger};

#[derive(Debug)]
pub enum SyncError {
    /// Another run holds the orchestrator.
    AlreadyRunning { started_at: DateTime<Utc> },
    Store(sqlx::Error),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::AlreadyRunning { started_at } => {
                write!(f, "A sync run is already in progress (started {})", started_at.to_rfc3339())
            }
            SyncError::Store(e) => write!(f, "Failed to persist meetings: {e}"),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<sqlx::Error> for SyncError {
    fn from(e: sqlx::Error) -> Self {
        SyncError::Store(e)
    }
}
