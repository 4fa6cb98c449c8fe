//! Client-side request quota per provider

use crate::error::ProviderError;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;

/// Token bucket allowing `requests_per_minute` requests, refilled evenly
pub struct Throttle {
    limiter: DefaultDirectRateLimiter,
    per_minute: NonZeroU32,
}

impl Throttle {
    /// `None` when the quota is zero
    pub fn per_minute(requests: u32) -> Option<Self> {
        let per_minute = NonZeroU32::new(requests)?;
        Some(Self {
            limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
            per_minute,
        })
    }

    /// Take one request from the quota without waiting
    pub fn acquire(&self) -> Result<(), ProviderError> {
        self.limiter
            .check()
            .map_err(|_| ProviderError::RateLimited)
    }

    pub fn quota(&self) -> u32 {
        self.per_minute.get()
    }
}

impl std::fmt::Debug for Throttle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Throttle({}/min)", self.per_minute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_quota_is_enforced() {
        let throttle = Throttle::per_minute(3).unwrap();
        for _ in 0..3 {
            assert_ok!(throttle.acquire());
        }
        assert_eq!(assert_err!(throttle.acquire()), ProviderError::RateLimited);
    }

    #[test]
    fn test_zero_quota_disables() {
        assert!(Throttle::per_minute(0).is_none());
        assert_eq!(Throttle::per_minute(10).unwrap().quota(), 10);
    }
}
