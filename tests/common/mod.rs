//! Shared test infrastructure.
//!
//! - `FeedServer` - local actix server serving fixture TSML feeds
//! - `MemoryStore` - in-memory `MeetingStore` for orchestrator tests
//! - `setup_test_db()` - isolated Postgres schema, skipped without `TEST_DATABASE_URL`
#![allow(dead_code)]

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actix_web::{App, HttpRequest, HttpResponse, HttpServer, http::StatusCode, web};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use proofmeet_sync::feeds::{FeedFetcher, FeedFormat, FeedSource};
use proofmeet_sync::models::meeting::{ExternalMeeting, Program, UpsertOutcome};
use proofmeet_sync::models::sync_run::{NewSyncRun, SyncRunRecord};
use proofmeet_sync::sync::MeetingStore;

// ============================================================================
// FIXTURE FEEDS
// ============================================================================

/// First Zoom-style ID handed out by fixtures (9 digits).
pub const BASE_ZOOM_ID: u64 = 810_000_000;

/// A TSML array with one Zoom meeting per ID plus `without_id` records that
/// have no usable conference link.
pub fn tsml_feed<I: IntoIterator<Item = u64>>(ids: I, without_id: usize) -> String {
    let mut entries: Vec<Value> = ids
        .into_iter()
        .map(|id| {
            json!({
                "name": format!("Online Meeting {id}"),
                "slug": format!("online-meeting-{id}"),
                "day": id % 7,
                "time": "19:00:00",
                "timezone": "America/New_York",
                "conference_url": format!("https://us02web.zoom.us/j/{id}?pwd=abc123"),
            })
        })
        .collect();
    for i in 0..without_id {
        entries.push(json!({
            "name": format!("Phone-only Meeting {i}"),
            "day": 2,
            "time": "12:00",
            "conference_url": "",
            "conference_phone": "+1 555 0100",
        }));
    }
    Value::Array(entries).to_string()
}

/// `count` consecutive IDs starting at `BASE_ZOOM_ID + offset`.
pub fn zoom_ids(offset: u64, count: u64) -> impl Iterator<Item = u64> {
    (0..count).map(move |i| BASE_ZOOM_ID + offset + i)
}

#[derive(Clone)]
pub struct FeedRoute {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl FeedRoute {
    pub fn ok(body: String) -> Self {
        Self { status: 200, body, delay: Duration::ZERO }
    }

    pub fn status(status: u16) -> Self {
        Self { status, body: "{\"error\":\"unavailable\"}".to_string(), delay: Duration::ZERO }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Local HTTP server standing in for upstream meeting directories.
pub struct FeedServer {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
    handle: actix_web::dev::ServerHandle,
}

impl FeedServer {
    /// Must be called from inside an actix runtime (`#[actix_rt::test]`).
    pub fn start(routes: Vec<(&str, FeedRoute)>) -> Self {
        let routes: Arc<HashMap<String, FeedRoute>> = Arc::new(
            routes
                .into_iter()
                .map(|(path, route)| (path.to_string(), route))
                .collect(),
        );
        let hits = Arc::new(AtomicUsize::new(0));

        let server_hits = Arc::clone(&hits);
        let server = HttpServer::new(move || {
            let routes = Arc::clone(&routes);
            let hits = Arc::clone(&server_hits);
            App::new().default_service(web::to(move |req: HttpRequest| {
                let routes = Arc::clone(&routes);
                let hits = Arc::clone(&hits);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    match routes.get(req.path()) {
                        Some(route) => {
                            if !route.delay.is_zero() {
                                actix_rt::time::sleep(route.delay).await;
                            }
                            let status = StatusCode::from_u16(route.status)
                                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                            HttpResponse::build(status)
                                .content_type("application/json")
                                .body(route.body.clone())
                        }
                        None => HttpResponse::NotFound().finish(),
                    }
                }
            }))
        })
        .workers(2)
        .disable_signals()
        .bind(("127.0.0.1", 0))
        .expect("Failed to bind feed server");

        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_rt::spawn(server);

        FeedServer {
            base_url: format!("http://{addr}"),
            hits,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub async fn stop(self) {
        self.handle.stop(false).await;
    }
}

pub fn source(name: &str, url: String, program: Program) -> FeedSource {
    FeedSource {
        name: name.to_string(),
        url,
        program,
        format: FeedFormat::Tsml,
        use_proxy: false,
    }
}

pub fn test_fetcher() -> FeedFetcher {
    FeedFetcher::new(Duration::from_secs(5), None, 4).expect("Failed to build fetcher")
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

#[derive(Debug, Clone)]
pub struct StoredMeeting {
    pub meeting: ExternalMeeting,
    pub first_seen_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
}

/// `MeetingStore` over a mutex-guarded map, keyed by external ID like the
/// unique constraint in Postgres.
#[derive(Default)]
pub struct MemoryStore {
    meetings: Mutex<HashMap<String, StoredMeeting>>,
    runs: Mutex<Vec<SyncRunRecord>>,
    fail_upserts: AtomicBool,
    upsert_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent upsert fail.
    pub fn fail_upserts(&self) {
        self.fail_upserts.store(true, Ordering::SeqCst);
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.meetings.lock().unwrap().len()
    }

    pub fn get(&self, external_id: &str) -> Option<StoredMeeting> {
        self.meetings.lock().unwrap().get(external_id).cloned()
    }

    pub fn insert_stale(&self, meeting: ExternalMeeting, last_synced_at: DateTime<Utc>) {
        self.meetings.lock().unwrap().insert(
            meeting.external_id.clone(),
            StoredMeeting { meeting, first_seen_at: last_synced_at, last_synced_at },
        );
    }

    pub fn runs(&self) -> Vec<SyncRunRecord> {
        self.runs.lock().unwrap().clone()
    }
}

impl MeetingStore for MemoryStore {
    async fn upsert(
        &self,
        meeting: &ExternalMeeting,
        seen_at: DateTime<Utc>,
    ) -> Result<UpsertOutcome, sqlx::Error> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        let mut meetings = self.meetings.lock().unwrap();
        match meetings.entry(meeting.external_id.clone()) {
            Entry::Occupied(mut entry) => {
                let stored = entry.get_mut();
                stored.meeting = meeting.clone();
                stored.last_synced_at = seen_at;
                Ok(UpsertOutcome::AlreadyExisted)
            }
            Entry::Vacant(entry) => {
                entry.insert(StoredMeeting {
                    meeting: meeting.clone(),
                    first_seen_at: seen_at,
                    last_synced_at: seen_at,
                });
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn record_run(&self, run: &NewSyncRun) -> Result<(), sqlx::Error> {
        let mut runs = self.runs.lock().unwrap();
        let id = runs.len() as i64 + 1;
        runs.push(SyncRunRecord {
            id,
            trigger: run.trigger.clone(),
            status: run.status.clone(),
            started_at: run.started_at,
            finished_at: run.finished_at,
            total_fetched: run.total_fetched,
            saved: run.saved,
            inserted: run.inserted,
            error: run.error.clone(),
            summary: run.summary.clone(),
        });
        Ok(())
    }

    async fn recent_runs(&self, limit: i64) -> Result<Vec<SyncRunRecord>, sqlx::Error> {
        let runs = self.runs.lock().unwrap();
        Ok(runs.iter().rev().take(limit.max(0) as usize).cloned().collect())
    }

    async fn prune_not_synced_since(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let mut meetings = self.meetings.lock().unwrap();
        let before = meetings.len();
        meetings.retain(|_, stored| stored.last_synced_at >= cutoff);
        Ok((before - meetings.len()) as u64)
    }
}

pub fn meeting(external_id: &str, program: Program) -> ExternalMeeting {
    ExternalMeeting {
        external_id: external_id.to_string(),
        program,
        name: format!("Meeting {external_id}"),
        day_of_week: Some(1),
        time: "19:00".to_string(),
        timezone: "America/Chicago".to_string(),
        join_url: format!("https://zoom.us/j/{external_id}"),
        source_feed: "fixture".to_string(),
    }
}

// ============================================================================
// POSTGRES
// ============================================================================

pub struct TestDb {
    pool: PgPool,
    pub schema: String,
}

impl TestDb {
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Connect to `TEST_DATABASE_URL` and migrate a fresh schema for this test.
/// Returns `None` (and the test returns early) when the variable is unset.
pub async fn setup_test_db() -> Option<TestDb> {
    let url = match std::env::var("TEST_DATABASE_URL") {
        Ok(url) if !url.is_empty() => url,
        _ => {
            eprintln!("TEST_DATABASE_URL not set, skipping Postgres test");
            return None;
        }
    };

    let schema = format!("sync_test_{}", rand::random::<u32>());
    let admin = PgPoolOptions::new()
        .max_connections(1)
        .connect(&url)
        .await
        .expect("Failed to connect to test database");
    sqlx::query(&format!("CREATE SCHEMA {schema}"))
        .execute(&admin)
        .await
        .expect("Failed to create test schema");
    admin.close().await;

    let search_path = format!("SET search_path TO {schema}");
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .after_connect(move |conn, _meta| {
            let search_path = search_path.clone();
            Box::pin(async move {
                sqlx::query(&search_path).execute(conn).await?;
                Ok(())
            })
        })
        .connect(&url)
        .await
        .expect("Failed to connect test pool");

    proofmeet_sync::db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    Some(TestDb { pool, schema })
}
