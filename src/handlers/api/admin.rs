use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::meeting;
use crate::models::sync_run::SyncRunRecord;
use crate::sync::{MeetingStore, SyncOrchestrator, SyncState, SyncTrigger};

const DEFAULT_RECENT_RUNS: i64 = 10;

/// POST /api/admin/sync - Run a sync now and return its summary.
///
/// The run executes on its own task so a disconnecting client cannot cancel
/// it halfway through. Returns 409 while another run is in progress.
pub async fn trigger_sync<S: MeetingStore + 'static>(
    orchestrator: web::Data<SyncOrchestrator<S>>,
) -> Result<HttpResponse, AppError> {
    let orchestrator = orchestrator.into_inner();
    log::info!("Manual sync requested");

    let summary = actix_web::rt::spawn(async move { orchestrator.run(SyncTrigger::Manual).await })
        .await
        .map_err(|e| AppError::Internal(format!("Sync task failed: {e}")))??;

    Ok(HttpResponse::Ok().json(summary))
}

#[derive(Deserialize)]
pub struct StatusQuery {
    pub limit: Option<i64>,
}

#[derive(Serialize)]
struct SyncStatusResponse {
    current: SyncState,
    recent_runs: Vec<SyncRunRecord>,
}

/// GET /api/admin/sync/status - Orchestrator state and recent run history.
pub async fn sync_status<S: MeetingStore + 'static>(
    orchestrator: web::Data<SyncOrchestrator<S>>,
    query: web::Query<StatusQuery>,
) -> Result<HttpResponse, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_RUNS).clamp(1, 100);
    let recent_runs = orchestrator.store().recent_runs(limit).await?;

    Ok(HttpResponse::Ok().json(SyncStatusResponse {
        current: orchestrator.state(),
        recent_runs,
    }))
}

/// GET /api/admin/stats - Stored meeting counts grouped by program.
pub async fn stats(pool: web::Data<PgPool>) -> Result<HttpResponse, AppError> {
    let stats = meeting::stats(&pool).await?;
    Ok(HttpResponse::Ok().json(stats))
}

#[derive(Deserialize)]
pub struct PruneQuery {
    pub older_than_days: i64,
}

/// POST /api/admin/meetings/prune?older_than_days=N - Delete meetings not
/// seen by any sync for N days.
pub async fn prune<S: MeetingStore + 'static>(
    orchestrator: web::Data<SyncOrchestrator<S>>,
    query: web::Query<PruneQuery>,
) -> Result<HttpResponse, AppError> {
    if !(1..=meeting::MAX_RETENTION_DAYS).contains(&query.older_than_days) {
        return Err(AppError::BadRequest(format!(
            "older_than_days must be between 1 and {}",
            meeting::MAX_RETENTION_DAYS
        )));
    }

    let cutoff = Utc::now() - chrono::Duration::days(query.older_than_days);
    let pruned = orchestrator.store().prune_not_synced_since(cutoff).await?;
    log::info!(
        "Pruned {} meeting(s) not synced in {} day(s)",
        pruned,
        query.older_than_days
    );

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "pruned": pruned,
        "cutoff": cutoff,
    })))
}
