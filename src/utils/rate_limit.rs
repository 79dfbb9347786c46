//! Token-bucket admission control for outbound requests.

use governor::{DefaultDirectRateLimiter, Quota};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ArchiveError, Result};

/// Token bucket: `burst` tokens of capacity, refilled at `rate` per second.
///
/// Acquiring waits cooperatively until a token is available. Requests are
/// delayed, never dropped. Waiting holds no reservation, so an abandoned wait
/// costs nothing.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    limiter: Arc<DefaultDirectRateLimiter>,
    rate: f64,
    burst: u32,
}

impl RateLimiter {
    /// Create a limiter for `rate` requests per second with bucket size `burst`
    pub fn new(rate: f64, burst: u32) -> Result<Self> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ArchiveError::Configuration(format!(
                "rate limit must be positive, got {}",
                rate
            )));
        }
        let burst_nz = NonZeroU32::new(burst).ok_or_else(|| {
            ArchiveError::Configuration("burst limit must be greater than zero".to_string())
        })?;

        let period = Duration::try_from_secs_f64(1.0 / rate).map_err(|_| {
            ArchiveError::Configuration(format!("rate limit {} is too small", rate))
        })?;
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(nonzero!(1_000_000u32)))
            .allow_burst(burst_nz);

        Ok(Self {
            limiter: Arc::new(governor::RateLimiter::direct(quota)),
            rate,
            burst,
        })
    }

    /// Wait for one token
    pub async fn acquire(&self) {
        if self.limiter.check().is_ok() {
            return;
        }
        tracing::debug!(rate = self.rate, burst = self.burst, "Waiting for rate limit token");
        self.limiter.until_ready().await;
    }

    /// Take a token only if one is available right now
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    /// Requests per second
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Bucket capacity
    pub fn burst(&self) -> u32 {
        self.burst
    }
}
