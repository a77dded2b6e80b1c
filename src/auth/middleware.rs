use actix_web::{
    Error, HttpResponse,
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    middleware::Next,
    web,
};

use super::rate_limit::RateLimiter;

/// Header carrying the shared admin secret.
pub const ADMIN_SECRET_HEADER: &str = "x-admin-secret";

/// Shared secret for the admin endpoints. `None` locks them entirely.
#[derive(Clone)]
pub struct AdminSecret(Option<String>);

impl AdminSecret {
    pub fn new(secret: Option<String>) -> Self {
        Self(secret.filter(|s| !s.is_empty()))
    }

    pub fn is_configured(&self) -> bool {
        self.0.is_some()
    }

    pub fn matches(&self, presented: &str) -> bool {
        match &self.0 {
            Some(expected) => constant_time_eq(expected.as_bytes(), presented.as_bytes()),
            None => false,
        }
    }
}

impl std::fmt::Debug for AdminSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(if self.0.is_some() { "AdminSecret(****)" } else { "AdminSecret(unset)" })
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Middleware that rejects admin requests lacking the shared secret header.
/// Runs before the handler, so a rejected request never starts any sync work.
pub async fn require_admin_secret(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let peer_ip = req.peer_addr().map(|addr| addr.ip());
    let limiter = req.app_data::<web::Data<RateLimiter>>().cloned();

    if let (Some(ip), Some(limiter)) = (peer_ip, &limiter) {
        if limiter.is_blocked(ip) {
            log::warn!("Admin request from {} blocked after repeated failures", ip);
            let response = HttpResponse::TooManyRequests().json(serde_json::json!({
                "error": "Too many failed attempts, try again later"
            }));
            return Ok(req.into_response(response).map_into_right_body());
        }
    }

    let authorized = match req.app_data::<web::Data<AdminSecret>>() {
        Some(secret) => req
            .headers()
            .get(ADMIN_SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|presented| secret.matches(presented)),
        None => false,
    };

    if let (Some(ip), Some(limiter)) = (peer_ip, &limiter) {
        if authorized {
            limiter.clear(ip);
        } else {
            limiter.record_failure(ip);
        }
    }

    if !authorized {
        log::warn!(
            "Rejected admin request {} {} from {}",
            req.method(),
            req.path(),
            req.connection_info().realip_remote_addr().unwrap_or("unknown")
        );
        let response = HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Missing or invalid admin secret"
        }));
        return Ok(req.into_response(response).map_into_right_body());
    }

    next.call(req).await.map(|res| res.map_into_left_body())
}
