use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::meeting::{self, ExternalMeeting, UpsertOutcome};
use crate::models::sync_run::{self, NewSyncRun, SyncRunRecord};

/// Persistence gateway used by the sync orchestrator.
///
/// `upsert` must be atomic per external ID: two overlapping runs upserting the
/// same meeting leave exactly one stored row.
pub trait MeetingStore: Send + Sync {
    fn upsert(
        &self,
        meeting: &ExternalMeeting,
        seen_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<UpsertOutcome, sqlx::Error>> + Send;

    fn record_run(&self, run: &NewSyncRun) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Most recent runs first.
    fn recent_runs(
        &self,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<SyncRunRecord>, sqlx::Error>> + Send;

    /// Remove meetings whose last sync is older than `cutoff`.
    fn prune_not_synced_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64, sqlx::Error>> + Send;
}

impl<T: MeetingStore> MeetingStore for Arc<T> {
    fn upsert(
        &self,
        meeting: &ExternalMeeting,
        seen_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<UpsertOutcome, sqlx::Error>> + Send {
        (**self).upsert(meeting, seen_at)
    }

    fn record_run(&self, run: &NewSyncRun) -> impl Future<Output = Result<(), sqlx::Error>> + Send {
        (**self).record_run(run)
    }

    fn recent_runs(
        &self,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<SyncRunRecord>, sqlx::Error>> + Send {
        (**self).recent_runs(limit)
    }

    fn prune_not_synced_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64, sqlx::Error>> + Send {
        (**self).prune_not_synced_since(cutoff)
    }
}

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgMeetingStore {
    pool: PgPool,
}

impl PgMeetingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl MeetingStore for PgMeetingStore {
    async fn upsert(
        &self,
        meeting: &ExternalMeeting,
        seen_at: DateTime<Utc>,
    ) -> Result<UpsertOutcome, sqlx::Error> {
        meeting::upsert(&self.pool, meeting, seen_at).await
    }

    async fn record_run(&self, run: &NewSyncRun) -> Result<(), sqlx::Error> {
        sync_run::insert(&self.pool, run).await.map(|_| ())
    }

    async fn recent_runs(&self, limit: i64) -> Result<Vec<SyncRunRecord>, sqlx::Error> {
        sync_run::find_recent(&self.pool, limit).await
    }

    async fn prune_not_synced_since(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        meeting::prune_not_synced_since(&self.pool, cutoff).await
    }
}
