use std::time::Duration;

use tokio::task::JoinHandle;

/// Collapses a burst of triggers into one action, run once the burst has
/// been quiet for the whole window. Owns at most one timer at a time.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    timer: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            timer: None,
        }
    }

    /// Restart the window; `action` replaces any action still pending
    pub fn trigger<F>(&mut self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        let window = self.window;
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            action();
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.timer.as_ref().is_some_and(|timer| !timer.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> Box<dyn FnOnce() + Send>) {
        let count = Arc::new(AtomicUsize::new(0));
        let make = {
            let count = count.clone();
            move || {
                let count = count.clone();
                Box::new(move || {
                    count.fetch_add(1, Ordering::SeqCst);
                }) as Box<dyn FnOnce() + Send>
            }
        };
        (count, make)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_fires_once_after_quiet_window() {
        let (count, action) = counter();
        let mut debouncer = Debouncer::new(Duration::from_millis(100));

        for _ in 0..10 {
            debouncer.trigger(action());
            tokio::time::advance(Duration::from_millis(20)).await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(100)).await;
        tokio::task::yield_now().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_action() {
        let (count, action) = counter();
        let mut debouncer = Debouncer::new(Duration::from_millis(100));

        debouncer.trigger(action());
        debouncer.cancel();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_the_debouncer_stops_its_timer() {
        let (count, action) = counter();
        {
            let mut debouncer = Debouncer::new(Duration::from_millis(100));
            debouncer.trigger(action());
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
