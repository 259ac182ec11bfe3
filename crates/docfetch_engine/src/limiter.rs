use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;

/// Admission gate for concurrent direct fetches.
///
/// Waiters are admitted first-in first-out (tokio's semaphore is fair), at
/// most `max` tasks run at once, and every submitted task eventually runs.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    max: usize,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Default for ConcurrencyLimiter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX)
    }
}

impl ConcurrencyLimiter {
    pub const DEFAULT_MAX: usize = 6;

    /// `max` below 1 is raised to 1.
    pub fn new(max: usize) -> Self {
        let max = max.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max)),
            max,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of tasks observed running at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Wait for a slot, then drive `task` to completion inside it.
    pub async fn run<F, T>(&self, task: F) -> T
    where
        F: Future<Output = T>,
    {
        // The semaphore is never closed, so acquire cannot fail.
        let permit = self.semaphore.acquire().await;
        debug_assert!(permit.is_ok());
        let slot = InFlight::enter(&self.in_flight, &self.peak);
        let output = task.await;
        drop(slot);
        drop(permit);
        output
    }
}

/// Keeps the in-flight count right even if the task panics.
struct InFlight<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_raised_to_one() {
        assert_eq!(ConcurrencyLimiter::new(0).max(), 1);
        assert_eq!(ConcurrencyLimiter::default().max(), 6);
    }
}
