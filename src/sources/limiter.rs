//! Admission limiters for expensive queries.

use std::num::NonZeroU32;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Decides whether an expensive query may start a computation.
///
/// Consulted only on a cache miss, and only for expensive query shapes.
pub trait AdmissionLimiter: Send + Sync {
    /// Consumes one permit. Returns `false` if the caller must be throttled.
    fn check(&self) -> bool;
}

/// Token bucket shared by every expensive query.
pub struct GovernorLimiter {
    limiter: DirectRateLimiter,
}

impl std::fmt::Debug for GovernorLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GovernorLimiter").finish_non_exhaustive()
    }
}

impl GovernorLimiter {
    /// Allows `per_minute` sustained admissions with bursts of `burst`.
    /// Zero values are raised to one.
    pub fn new(per_minute: u32, burst: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: RateLimiter::direct(quota),
        }
    }
}

impl AdmissionLimiter for GovernorLimiter {
    fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

/// Never throttles.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlimited;

impl AdmissionLimiter for Unlimited {
    fn check(&self) -> bool {
        true
    }
}
