//! Rate limiting for probe connection attempts.
//!
//! Token bucket pacing shared by every probe of a job, so a large scan does
//! not hit the target with a burst of connection attempts.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

/// A rate limiter for controlling probe speed.
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<GovLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl RateLimiter {
    /// Create a limiter allowing `rate` probes per second.
    ///
    /// Returns `None` for a rate of 0, which means unlimited.
    pub fn per_second(rate: u32) -> Option<Self> {
        let rate = NonZeroU32::new(rate)?;
        Some(Self {
            limiter: Arc::new(GovLimiter::direct(Quota::per_second(rate))),
        })
    }

    /// Wait until a token is available.
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish_non_exhaustive()
    }
}
