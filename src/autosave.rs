//! Delayed-flush scheduling for draft autosave.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Runs one pending action after a quiescence window.
///
/// Re-scheduling before the window elapses replaces the pending action, so
/// a burst of mutations collapses into a single flush carrying the state
/// captured when the window finally fires.
pub struct Debouncer {
    window: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Mutex::new(None),
        }
    }

    /// Replace any pending action with `action`, run once the window elapses.
    pub fn schedule<F>(&self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let window = self.window;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            action.await;
        });

        let mut slot = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    /// Drop the pending action without running it.
    pub fn cancel(&self) {
        let mut slot = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.take() {
            previous.abort();
        }
    }
}

impl Drop for Debouncer {
    /// A window still open at teardown is cancelled; the controller flushes
    /// explicitly when the final state must be durable.
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_burst_of_schedules_runs_only_the_last_action() {
        let fired = Arc::new(AtomicUsize::new(0));
        let last_value = Arc::new(AtomicUsize::new(0));
        let debouncer = Debouncer::new(Duration::from_millis(50));

        for i in 1..=5 {
            let fired = Arc::clone(&fired);
            let last_value = Arc::clone(&last_value);
            debouncer.schedule(async move {
                fired.fetch_add(1, Ordering::SeqCst);
                last_value.store(i, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(last_value.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_cancel_drops_the_pending_action() {
        let fired = Arc::new(AtomicUsize::new(0));
        let debouncer = Debouncer::new(Duration::from_millis(50));

        {
            let fired = Arc::clone(&fired);
            debouncer.schedule(async move {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }
        debouncer.cancel();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_actions_spaced_beyond_the_window_each_run() {
        let fired = Arc::new(AtomicUsize::new(0));
        let debouncer = Debouncer::new(Duration::from_millis(20));

        for _ in 0..2 {
            let fired = Arc::clone(&fired);
            debouncer.schedule(async move {
                fired.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(120)).await;
        }

        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }
}
