//! Spacing between successive payouts in a batch.
//!
//! Payout batches hit the same LNURL services and relays back to back;
//! a pacer keeps the batch under their rate limits.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Gate awaited before each payout.
#[async_trait]
pub trait PayoutPacer: Send + Sync {
    /// Resolve when the next payout may start.
    async fn ready(&self);
}

/// Guarantees at least `interval` between successive `ready()` completions.
///
/// The first call returns immediately.
pub struct FixedIntervalPacer {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl FixedIntervalPacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl PayoutPacer for FixedIntervalPacer {
    async fn ready(&self) {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            tokio::time::sleep_until(previous + self.interval).await;
        }
        *last = Some(Instant::now());
    }
}

/// Never waits.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPacing;

#[async_trait]
impl PayoutPacer for NoPacing {
    async fn ready(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_call_is_immediate() {
        let pacer = FixedIntervalPacer::from_millis(1500);
        let start = Instant::now();
        pacer.ready().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spacing_between_calls() {
        let pacer = FixedIntervalPacer::from_millis(1500);
        let start = Instant::now();

        pacer.ready().await;
        pacer.ready().await;
        assert!(start.elapsed() >= Duration::from_millis(1500));
        pacer.ready().await;
        assert!(start.elapsed() >= Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_work_is_not_penalized() {
        let pacer = FixedIntervalPacer::from_millis(1000);
        pacer.ready().await;
        tokio::time::sleep(Duration::from_millis(2500)).await;

        let before = Instant::now();
        pacer.ready().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_pacing() {
        let start = Instant::now();
        for _ in 0..10 {
            NoPacing.ready().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
