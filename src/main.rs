use actix_web::{App, HttpServer, middleware, web};

use proofmeet_sync::auth::{AdminSecret, RateLimiter};
use proofmeet_sync::config::AppConfig;
use proofmeet_sync::feeds::FeedFetcher;
use proofmeet_sync::sync::{PgMeetingStore, SyncOrchestrator, scheduler};
use proofmeet_sync::{db, handlers};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        log::error!("Configuration error: {}", e);
        std::process::exit(1);
    });

    let pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let admin_secret = AdminSecret::new(config.admin_secret.clone());
    if !admin_secret.is_configured() {
        log::warn!("No ADMIN_SECRET set; admin endpoints will reject every request");
    }
    if config.proxy.is_none() && config.sources.iter().any(|s| s.use_proxy) {
        log::warn!("Some feeds require the bypass proxy but PROXY_ENDPOINT is not set; they will fail");
    }

    let fetcher = FeedFetcher::new(config.feed_timeout, config.proxy.clone(), config.max_concurrent_fetches)
        .expect("Failed to build HTTP client");
    log::info!(
        "Syncing {} feed(s): {}",
        config.sources.len(),
        config
            .sources
            .iter()
            .map(|s| format!("{} ({})", s.name, s.program))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let orchestrator = web::Data::new(
        SyncOrchestrator::new(fetcher, config.sources.clone(), PgMeetingStore::new(pool.clone()))
            .with_stale_after(config.stale_after_days.map(chrono::Duration::days)),
    );

    scheduler::spawn_scheduler(
        orchestrator.clone().into_inner(),
        config.sync_hour_utc,
        config.sync_on_startup,
    );

    let admin_secret = web::Data::new(admin_secret);
    let rate_limiter = web::Data::new(RateLimiter::default());

    log::info!("Starting server at http://{}", config.bind_addr);

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(web::Data::new(pool.clone()))
            .app_data(orchestrator.clone())
            .app_data(admin_secret.clone())
            .app_data(rate_limiter.clone())
            .route("/health", web::get().to(handlers::health::health))
            .configure(handlers::api::configure::<PgMeetingStore>)
            .default_service(web::to(|| async {
                actix_web::HttpResponse::NotFound()
                    .json(serde_json::json!({ "error": "Not found" }))
            }))
    })
    .bind(&config.bind_addr)?
    .run()
    .await
}
