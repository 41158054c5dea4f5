//! crates/enablement_core/src/throttle.rs
//!
//! Rate-limit courtesy for outbound provider calls: a global cap on calls in
//! flight plus an optional minimum spacing between call starts.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

pub struct ProviderThrottle {
    permits: Arc<Semaphore>,
    max_in_flight: usize,
    /// One call start per `min_spacing`; `None` when calls are not spaced.
    spacing: Option<DefaultDirectRateLimiter>,
}

impl ProviderThrottle {
    pub fn new(max_in_flight: usize, min_spacing: Duration) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
            spacing: Quota::with_period(min_spacing).map(RateLimiter::direct),
        }
    }

    /// A throttle that neither caps nor spaces calls.
    pub fn unlimited() -> Self {
        Self::new(Semaphore::MAX_PERMITS, Duration::ZERO)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Waits for a free slot and for the spacing interval, then returns the
    /// slot. The call counts as in flight until the permit is dropped.
    ///
    /// The semaphore is never closed, so `None` is not expected in practice.
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        let permit = self.permits.clone().acquire_owned().await.ok();

        if let Some(limiter) = &self.spacing {
            if limiter.check().is_err() {
                debug!("Provider throttle: waiting for call spacing");
                limiter.until_ready().await;
            }
        }

        permit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[tokio::test]
    async fn test_spacing_between_calls() {
        let throttle = ProviderThrottle::new(4, Duration::from_millis(100));
        let start = Instant::now();
        for _ in 0..3 {
            let _permit = throttle.acquire().await;
        }
        // Two waits of ~100ms each.
        assert!(start.elapsed() >= Duration::from_millis(190));
    }

    #[tokio::test]
    async fn test_caps_calls_in_flight() {
        let throttle = Arc::new(ProviderThrottle::new(2, Duration::ZERO));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let throttle = throttle.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _permit = throttle.acquire().await;
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_zero_cap_is_raised_to_one() {
        assert_eq!(ProviderThrottle::new(0, Duration::ZERO).max_in_flight(), 1);
    }
}
