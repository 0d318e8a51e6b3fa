use std::sync::Arc;

use crate::db::{DbPool, OrmConn};
use crate::ratelimit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub rate_limiter: Arc<RateLimiter>,
}
