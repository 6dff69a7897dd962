use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterSnapshot {
    pub limit: usize,
    pub in_flight: usize,
    pub waiters: usize,
    /// Highest `in_flight` seen so far
    pub peak: usize,
}

#[derive(Debug, Default)]
struct Counters {
    in_flight: AtomicUsize,
    waiters: AtomicUsize,
    peak: AtomicUsize,
}

/// Admits a new labeler call only while fewer than `limit` are running
#[derive(Debug, Clone)]
pub struct Limiter {
    limit: usize,
    semaphore: Arc<Semaphore>,
    counters: Arc<Counters>,
}

impl Limiter {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            limit,
            semaphore: Arc::new(Semaphore::new(limit)),
            counters: Arc::new(Counters::default()),
        }
    }

    pub async fn acquire(&self) -> LimiterPermit {
        // The semaphore is never closed; acquire failures are not expected.
        let waiter = WaiterGuard::new(self.counters.clone());
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .unwrap_or_else(|_| unreachable!("enrichment semaphore closed"));
        drop(waiter);
        let running = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(running, Ordering::SeqCst);
        LimiterPermit {
            _permit: permit,
            counters: self.counters.clone(),
        }
    }

    pub fn snapshot(&self) -> LimiterSnapshot {
        LimiterSnapshot {
            limit: self.limit,
            in_flight: self.counters.in_flight.load(Ordering::SeqCst),
            waiters: self.counters.waiters.load(Ordering::SeqCst),
            peak: self.counters.peak.load(Ordering::SeqCst),
        }
    }
}

pub struct LimiterPermit {
    _permit: OwnedSemaphorePermit,
    counters: Arc<Counters>,
}

impl Drop for LimiterPermit {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

struct WaiterGuard(Arc<Counters>);

impl WaiterGuard {
    fn new(counters: Arc<Counters>) -> Self {
        counters.waiters.fetch_add(1, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        self.0.waiters.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn never_exceeds_limit() {
        let limiter = Limiter::new(2);
        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..10 {
            let limiter = limiter.clone();
            tasks.spawn(async move {
                let _permit = limiter.acquire().await;
                tokio::time::sleep(Duration::from_millis(5)).await;
            });
        }
        while tasks.join_next().await.is_some() {}

        let snapshot = limiter.snapshot();
        assert_eq!(snapshot.in_flight, 0);
        assert_eq!(snapshot.waiters, 0);
        assert!(snapshot.peak <= 2);
        assert!(snapshot.peak >= 1);
    }

    #[test]
    fn zero_limit_admits_one() {
        assert_eq!(Limiter::new(0).snapshot().limit, 1);
    }
}
