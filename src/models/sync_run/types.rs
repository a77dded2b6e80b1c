use chrono::{DateTime, Utc};
use serde::Serialize;

/// A finished sync run, as written to `sync_runs`.
#[derive(Debug, Clone)]
pub struct NewSyncRun {
    pub trigger: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_fetched: i64,
    pub saved: i64,
    pub inserted: i64,
    pub error: Option<String>,
    pub summary: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SyncRunRecord {
    pub id: i64,
    pub trigger: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_fetched: i64,
    pub saved: i64,
    pub inserted: i64,
    pub error: Option<String>,
    pub summary: Option<serde_json::Value>,
}
