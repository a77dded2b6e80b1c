//! Admin API tests: the shared-secret gate, manual sync trigger, status,
//! and prune validation. Runs against the in-memory store.

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use actix_web::{App, http::StatusCode, test, web};
use chrono::Utc;
use serde_json::Value;

use proofmeet_sync::auth::{ADMIN_SECRET_HEADER, AdminSecret, RateLimiter};
use proofmeet_sync::handlers;
use proofmeet_sync::models::meeting::Program;
use proofmeet_sync::sync::SyncOrchestrator;

use common::*;

const SECRET: &str = "s3cret-for-tests";

fn orchestrator(server: &FeedServer) -> web::Data<SyncOrchestrator<MemoryStore>> {
    web::Data::new(SyncOrchestrator::new(
        test_fetcher(),
        vec![source("aa", server.url("/aa.json"), Program::Aa)],
        MemoryStore::new(),
    ))
}

macro_rules! admin_app {
    ($orchestrator:expr, $limiter:expr) => {
        test::init_service(
            App::new()
                .app_data($orchestrator.clone())
                .app_data(web::Data::new(AdminSecret::new(Some(SECRET.to_string()))))
                .app_data($limiter.clone())
                .configure(handlers::api::configure::<MemoryStore>),
        )
        .await
    };
}

fn peer() -> SocketAddr {
    "10.1.2.3:40000".parse().unwrap()
}

#[actix_rt::test]
async fn test_sync_without_secret_is_rejected_before_any_work() {
    let server = FeedServer::start(vec![("/aa.json", FeedRoute::ok(tsml_feed(zoom_ids(0, 3), 0)))]);
    let orchestrator = orchestrator(&server);
    let limiter = web::Data::new(RateLimiter::default());
    let app = admin_app!(orchestrator, limiter);

    let req = test::TestRequest::post().uri("/api/admin/sync").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/admin/sync")
        .insert_header((ADMIN_SECRET_HEADER, "wrong"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Missing or invalid admin secret");

    assert_eq!(server.hits(), 0);
    assert!(orchestrator.store().runs().is_empty());
    assert!(!orchestrator.state().is_running());
    server.stop().await;
}

#[actix_rt::test]
async fn test_sync_with_secret_returns_summary() {
    let server = FeedServer::start(vec![("/aa.json", FeedRoute::ok(tsml_feed(zoom_ids(0, 3), 1)))]);
    let orchestrator = orchestrator(&server);
    let limiter = web::Data::new(RateLimiter::default());
    let app = admin_app!(orchestrator, limiter);

    let req = test::TestRequest::post()
        .uri("/api/admin/sync")
        .insert_header((ADMIN_SECRET_HEADER, SECRET))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["trigger"], "manual");
    assert_eq!(body["total_fetched"], 4);
    assert_eq!(body["dropped"], 1);
    assert_eq!(body["saved"], 3);
    assert_eq!(body["sources"][0]["status"], "success");
    assert_eq!(orchestrator.store().len(), 3);
    server.stop().await;
}

#[actix_rt::test]
async fn test_sync_status_reports_state_and_history() {
    let server = FeedServer::start(vec![("/aa.json", FeedRoute::ok(tsml_feed(zoom_ids(0, 2), 0)))]);
    let orchestrator = orchestrator(&server);
    let limiter = web::Data::new(RateLimiter::default());
    let app = admin_app!(orchestrator, limiter);

    let req = test::TestRequest::get()
        .uri("/api/admin/sync/status")
        .insert_header((ADMIN_SECRET_HEADER, SECRET))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["current"]["state"], "idle");
    assert_eq!(body["recent_runs"].as_array().map(Vec::len), Some(0));

    let req = test::TestRequest::post()
        .uri("/api/admin/sync")
        .insert_header((ADMIN_SECRET_HEADER, SECRET))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let req = test::TestRequest::get()
        .uri("/api/admin/sync/status?limit=5")
        .insert_header((ADMIN_SECRET_HEADER, SECRET))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["current"]["state"], "completed");
    assert_eq!(body["current"]["summary"]["saved"], 2);
    assert_eq!(body["recent_runs"][0]["status"], "completed");
    assert_eq!(body["recent_runs"][0]["trigger"], "manual");
    server.stop().await;
}

#[actix_rt::test]
async fn test_concurrent_manual_trigger_conflicts() {
    let server = FeedServer::start(vec![(
        "/aa.json",
        FeedRoute::ok(tsml_feed(zoom_ids(0, 2), 0)).delayed(Duration::from_millis(500)),
    )]);
    let orchestrator = orchestrator(&server);
    let limiter = web::Data::new(RateLimiter::default());
    let app = admin_app!(orchestrator, limiter);

    let first = test::TestRequest::post()
        .uri("/api/admin/sync")
        .insert_header((ADMIN_SECRET_HEADER, SECRET))
        .to_request();
    let second = test::TestRequest::post()
        .uri("/api/admin/sync")
        .insert_header((ADMIN_SECRET_HEADER, SECRET))
        .to_request();

    let (first, second) = tokio::join!(test::call_service(&app, first), async {
        actix_rt::time::sleep(Duration::from_millis(100)).await;
        test::call_service(&app, second).await
    });

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(server.hits(), 1);
    server.stop().await;
}

#[actix_rt::test]
async fn test_prune_validates_and_removes_stale_meetings() {
    let server = FeedServer::start(vec![]);
    let orchestrator = orchestrator(&server);
    orchestrator
        .store()
        .insert_stale(meeting("999999999", Program::Aa), Utc::now() - chrono::Duration::days(60));
    orchestrator
        .store()
        .insert_stale(meeting("888888888", Program::Na), Utc::now());
    let limiter = web::Data::new(RateLimiter::default());
    let app = admin_app!(orchestrator, limiter);

    let req = test::TestRequest::post()
        .uri("/api/admin/meetings/prune?older_than_days=0")
        .insert_header((ADMIN_SECRET_HEADER, SECRET))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(orchestrator.store().len(), 2);

    let req = test::TestRequest::post()
        .uri("/api/admin/meetings/prune?older_than_days=1000000000")
        .insert_header((ADMIN_SECRET_HEADER, SECRET))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().is_some_and(|e| e.contains("36500")));
    assert_eq!(orchestrator.store().len(), 2);

    let req = test::TestRequest::post()
        .uri("/api/admin/meetings/prune?older_than_days=30")
        .insert_header((ADMIN_SECRET_HEADER, SECRET))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["pruned"], 1);
    assert!(orchestrator.store().get("888888888").is_some());
    server.stop().await;
}

#[actix_rt::test]
async fn test_repeated_failures_are_rate_limited() {
    let server = FeedServer::start(vec![]);
    let orchestrator = orchestrator(&server);
    let limiter = web::Data::new(RateLimiter::new(3, Duration::from_secs(60)));
    let app = admin_app!(orchestrator, limiter);

    for _ in 0..3 {
        let req = test::TestRequest::get()
            .uri("/api/admin/sync/status")
            .peer_addr(peer())
            .insert_header((ADMIN_SECRET_HEADER, "guess"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    // Even the right secret is refused while the address is blocked.
    let req = test::TestRequest::get()
        .uri("/api/admin/sync/status")
        .peer_addr(peer())
        .insert_header((ADMIN_SECRET_HEADER, SECRET))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    server.stop().await;
}
