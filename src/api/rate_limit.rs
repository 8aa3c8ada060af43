//! Per-user rate limiting for the assistant endpoint

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{DefaultKeyedRateLimiter, Quota};

/// Rate limiter keyed by user ID
pub type SharedLimiter = Arc<DefaultKeyedRateLimiter<String>>;

/// Create a keyed limiter with the given requests-per-minute capacity
#[must_use]
pub fn create_limiter(requests_per_minute: u32) -> SharedLimiter {
    let rpm = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
    Arc::new(DefaultKeyedRateLimiter::keyed(Quota::per_minute(rpm)))
}
