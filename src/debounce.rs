//! Single-slot, resettable delayed action
//!
//! Bursts of door events should produce one photo, taken once the door has
//! been quiet for the configured delay. Each `arm` supersedes whatever was
//! pending, and the wait restarts from the latest call.
//!
//! Supersession is decided by generation number under the slot lock: the
//! timer task re-checks its generation before running, and `arm` bumps the
//! generation before scheduling. Once a task has claimed the slot its action
//! runs to completion and can no longer be cancelled.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

/// Owned by the dispatcher; nothing else arms or cancels it.
#[derive(Debug, Default)]
pub struct DebounceTimer {
    slot: Arc<Mutex<Slot>>,
}

impl DebounceTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `action` to run after `after`, cancelling any pending action.
    ///
    /// Returns the generation of the new arm.
    pub async fn arm<F>(&self, after: Duration, action: F) -> u64
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.slot.lock().await;

        slot.generation += 1;
        let generation = slot.generation;

        if let Some(previous) = slot.pending.take() {
            previous.abort();
            info!("Capture timer reset due to new door event");
        }

        let shared = Arc::clone(&self.slot);
        slot.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;

            {
                let mut slot = shared.lock().await;
                if slot.generation != generation {
                    debug!("Timer generation {} superseded", generation);
                    return;
                }
                slot.pending = None;
            }

            debug!("Timer generation {} fired", generation);
            action.await;
        }));

        info!("Capture timer started for {:?}", after);
        generation
    }

    /// Drop any pending action without running it.
    pub async fn cancel(&self) -> bool {
        let mut slot = self.slot.lock().await;
        slot.generation += 1;
        match slot.pending.take() {
            Some(pending) => {
                pending.abort();
                info!("Pending capture cancelled");
                true
            }
            None => false,
        }
    }

    pub async fn is_armed(&self) -> bool {
        self.slot.lock().await.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> std::pin::Pin<Box<dyn Future<Output = ()> + Send>>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let handle = Arc::clone(&fired);
        let make = move || {
            let fired = Arc::clone(&handle);
            Box::pin(async move {
                fired.fetch_add(1, Ordering::SeqCst);
            }) as std::pin::Pin<Box<dyn Future<Output = ()> + Send>>
        };
        (fired, make)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_after_delay() {
        let timer = DebounceTimer::new();
        let (fired, action) = counter();

        timer.arm(Duration::from_millis(100), action()).await;
        assert!(timer.is_armed().await);

        tokio::time::sleep(Duration::from_millis(99)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_armed().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_coalesces_and_restarts_wait() {
        let timer = DebounceTimer::new();
        let (fired, action) = counter();

        timer.arm(Duration::from_millis(100), action()).await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        timer.arm(Duration::from_millis(100), action()).await;

        // First deadline (100ms) passes without a fire
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        // Second deadline is 160ms
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_many_rearms_fire_once() {
        let timer = DebounceTimer::new();
        let (fired, action) = counter();

        for _ in 0..20 {
            timer.arm(Duration::from_millis(50), action()).await;
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_after_fire_fires_again() {
        let timer = DebounceTimer::new();
        let (fired, action) = counter();

        timer.arm(Duration::from_millis(10), action()).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        timer.arm(Duration::from_millis(10), action()).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_still_supersedes() {
        let timer = DebounceTimer::new();
        let (fired, action) = counter();

        let first = timer.arm(Duration::ZERO, action()).await;
        let second = timer.arm(Duration::ZERO, action()).await;
        assert_eq!(second, first + 1);

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let timer = DebounceTimer::new();
        let (fired, action) = counter();

        assert!(!timer.cancel().await);
        timer.arm(Duration::from_millis(10), action()).await;
        assert!(timer.cancel().await);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
