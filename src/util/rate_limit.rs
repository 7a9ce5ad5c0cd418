//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Per-client limiter for fire claims. A client exceeding its weapon's
/// plausible fire cadence has the excess claims dropped before they reach
/// the rewind pipeline.
#[derive(Clone)]
pub struct ClaimRateLimiter {
    claim_limiter: Arc<Limiter>,
}

impl ClaimRateLimiter {
    pub fn new(claims_per_second: u32) -> Self {
        Self {
            claim_limiter: create_limiter(claims_per_second),
        }
    }

    /// Check if a fire claim is allowed (returns true if allowed)
    pub fn check_claim(&self) -> bool {
        self.claim_limiter.check().is_ok()
    }
}
