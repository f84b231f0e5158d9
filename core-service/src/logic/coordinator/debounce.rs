//! Debouncer - collapses bursts of triggers into one action
//!
//! The first trigger arms a single-shot timer; each further trigger
//! re-arms it. Only the timer firing runs the action.

use std::future::Future;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

#[derive(Clone)]
pub struct Debouncer {
    tx: mpsc::UnboundedSender<()>,
}

impl Debouncer {
    pub fn spawn<F, Fut>(
        cooldown: Duration,
        mut shutdown: watch::Receiver<bool>,
        action: F,
    ) -> (Self, JoinHandle<()>)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();

        let handle = tokio::spawn(async move {
            'idle: loop {
                tokio::select! {
                    msg = rx.recv() => if msg.is_none() { break 'idle },
                    _ = shutdown.changed() => break 'idle,
                }

                let mut deadline = Instant::now() + cooldown;
                loop {
                    tokio::select! {
                        msg = rx.recv() => match msg {
                            Some(()) => deadline = Instant::now() + cooldown,
                            None => break 'idle,
                        },
                        _ = sleep_until(deadline) => break,
                        _ = shutdown.changed() => break 'idle,
                    }
                }

                action().await;
            }
            log::debug!("Debouncer stopped");
        });

        (Self { tx }, handle)
    }

    /// Returns false once the debounce task has stopped
    pub fn trigger(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(cooldown_ms: u64) -> (Debouncer, Arc<AtomicUsize>, watch::Sender<bool>, JoinHandle<()>) {
        let count = Arc::new(AtomicUsize::new(0));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let counter = count.clone();
        let (debouncer, handle) = Debouncer::spawn(Duration::from_millis(cooldown_ms), shutdown_rx, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        (debouncer, count, shutdown_tx, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_runs_once() {
        let (debouncer, count, _shutdown, _handle) = counting(100);

        for _ in 0..5 {
            assert!(debouncer.trigger());
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_run_separately() {
        let (debouncer, count, _shutdown, _handle) = counting(100);

        debouncer.trigger();
        tokio::time::sleep(Duration::from_millis(200)).await;
        debouncer.trigger();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending() {
        let (debouncer, count, shutdown, handle) = counting(100);

        debouncer.trigger();
        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!debouncer.trigger());
    }
}
