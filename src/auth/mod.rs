pub mod middleware;
pub mod rate_limit;

pub use middleware::{ADMIN_SECRET_HEADER, AdminSecret, require_admin_secret};
pub use rate_limit::RateLimiter;
