use sqlx::PgPool;

use super::types::*;

pub async fn insert(pool: &PgPool, run: &NewSyncRun) -> Result<i64, sqlx::Error> {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO sync_runs \
             (trigger, status, started_at, finished_at, total_fetched, saved, inserted, error, summary) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING id",
    )
    .bind(&run.trigger)
    .bind(&run.status)
    .bind(run.started_at)
    .bind(run.finished_at)
    .bind(run.total_fetched)
    .bind(run.saved)
    .bind(run.inserted)
    .bind(run.error.as_deref())
    .bind(run.summary.clone())
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Most recent runs first.
pub async fn find_recent(pool: &PgPool, limit: i64) -> Result<Vec<SyncRunRecord>, sqlx::Error> {
    sqlx::query_as::<_, SyncRunRecord>(
        "SELECT id, trigger, status, started_at, finished_at, total_fetched, saved, inserted, \
                error, summary \
         FROM sync_runs ORDER BY started_at DESC, id DESC LIMIT $1",
    )
    .bind(limit.clamp(1, 100))
    .fetch_all(pool)
    .await
}
