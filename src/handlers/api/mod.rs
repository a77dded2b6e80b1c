pub mod admin;
pub mod meetings;

use actix_web::web;
use serde::Serialize;

use crate::auth::require_admin_secret;
use crate::sync::MeetingStore;

#[derive(Serialize)]
pub struct PaginatedResponse<T: Serialize> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
}

/// Configure `/api` routes. Admin routes sit behind the shared-secret check.
pub fn configure<S: MeetingStore + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/meetings", web::get().to(meetings::search))
            .route("/meetings/{external_id}", web::get().to(meetings::read))
            .service(
                web::scope("/admin")
                    .wrap(actix_web::middleware::from_fn(require_admin_secret))
                    .configure(configure_admin::<S>),
            ),
    );
}

/// Admin routes, relative to the admin scope.
pub fn configure_admin<S: MeetingStore + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.route("/sync", web::post().to(admin::trigger_sync::<S>))
        .route("/sync/status", web::get().to(admin::sync_status::<S>))
        .route("/stats", web::get().to(admin::stats))
        .route("/meetings/prune", web::post().to(admin::prune::<S>));
}
