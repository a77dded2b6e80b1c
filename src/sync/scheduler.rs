use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, TimeZone, Utc};

use super::store::MeetingStore;
use super::{SyncError, SyncOrchestrator, SyncTrigger};

/// Run the sync once a day at `sync_hour_utc`:00 UTC, and optionally once at startup.
pub fn spawn_scheduler<S>(orchestrator: Arc<SyncOrchestrator<S>>, sync_hour_utc: u32, run_on_startup: bool)
where
    S: MeetingStore + 'static,
{
    actix_web::rt::spawn(async move {
        if run_on_startup {
            run_scheduled(&orchestrator).await;
        }
        loop {
            let wait = until_next_run(Utc::now(), sync_hour_utc);
            log::info!("Next scheduled sync in {} minute(s)", wait.as_secs() / 60);
            tokio::time::sleep(wait).await;
            run_scheduled(&orchestrator).await;
        }
    });
}

async fn run_scheduled<S: MeetingStore>(orchestrator: &SyncOrchestrator<S>) {
    match orchestrator.run(SyncTrigger::Scheduled).await {
        Ok(_) => {}
        Err(SyncError::AlreadyRunning { started_at }) => {
            log::info!("Skipping scheduled sync: run started at {} still in progress", started_at);
        }
        Err(e) => log::error!("Scheduled sync failed: {}", e),
    }
}

/// Time from `now` until the next `hour`:00 UTC (tomorrow if already past).
pub fn until_next_run(now: DateTime<Utc>, hour: u32) -> Duration {
    let at = NaiveTime::from_hms_opt(hour % 24, 0, 0).unwrap_or(NaiveTime::MIN);
    let mut next = Utc.from_utc_datetime(&now.date_naive().and_time(at));
    if next <= now {
        next += chrono::Duration::days(1);
    }
    (next - now).to_std().unwrap_or(Duration::ZERO)
}
