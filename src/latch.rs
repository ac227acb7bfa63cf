// Async counting barrier used to stop measurement clocks after exactly N
// message deliveries.
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

pub struct CountdownLatch {
    remaining: AtomicUsize,
    notify: Notify,
}

impl CountdownLatch {
    pub fn new(count: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(count),
            notify: Notify::new(),
        }
    }

    /// Signal one completion. Signals beyond the initial count are ignored.
    pub fn count_down(&self) {
        let mut current = self.remaining.load(Ordering::Acquire);
        while current > 0 {
            match self.remaining.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    if current == 1 {
                        self.notify.notify_waiters();
                    }
                    return;
                }
                Err(observed) => current = observed,
            }
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Resolve once the count reaches zero; immediately if it already has.
    pub async fn wait(&self) {
        loop {
            if self.remaining.load(Ordering::Acquire) == 0 {
                return;
            }
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register interest before re-checking so a concurrent final
            // count_down cannot slip between the check and the await.
            notified.as_mut().enable();
            if self.remaining.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CountdownLatch;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn wait_returns_once_count_reaches_zero() {
        let latch = Arc::new(CountdownLatch::new(3));
        let waiter = tokio::spawn({
            let latch = Arc::clone(&latch);
            async move { latch.wait().await }
        });
        for _ in 0..3 {
            latch.count_down();
        }
        timeout(Duration::from_secs(1), waiter)
            .await
            .expect("latch released")
            .expect("waiter task");
    }

    #[tokio::test]
    async fn wait_is_immediate_when_count_starts_at_zero() {
        let latch = CountdownLatch::new(0);
        timeout(Duration::from_millis(100), latch.wait())
            .await
            .expect("no waiting needed");
    }

    #[tokio::test]
    async fn wait_blocks_while_count_is_positive() {
        let latch = CountdownLatch::new(1);
        assert!(timeout(Duration::from_millis(50), latch.wait()).await.is_err());
    }

    #[test]
    fn extra_signals_are_ignored() {
        let latch = CountdownLatch::new(1);
        latch.count_down();
        latch.count_down();
        assert_eq!(latch.remaining(), 0);
    }

    #[tokio::test]
    async fn wait_after_completion_still_returns() {
        let latch = CountdownLatch::new(2);
        latch.count_down();
        latch.count_down();
        timeout(Duration::from_millis(100), latch.wait())
            .await
            .expect("already complete");
    }
}
