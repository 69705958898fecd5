//! Edge-triggered polling of OS state
//!
//! macOS offers no notification a daemon can rely on when the user grants
//! Accessibility access or switches applications, so both are polled and
//! only changes are forwarded.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use super::Signal;

/// Call `read` every `every` and send `signal(value)` whenever the answer
/// differs from the last one sent, starting with `initial`.
/// Returns when the receiver is gone.
pub async fn run_poller<F>(
    read: F,
    signal: fn(bool) -> Signal,
    initial: bool,
    every: Duration,
    signal_tx: mpsc::Sender<Signal>,
) where
    F: Fn() -> bool,
{
    let mut last = initial;
    let mut ticker = time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let now = read();
        if now == last {
            continue;
        }

        let update = signal(now);
        info!(?update, "polled signal changed");
        if signal_tx.send(update).await.is_err() {
            debug!("signal receiver closed, poller exiting");
            return;
        }
        last = now;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_poller_sends_edges_only() {
        let granted = Arc::new(AtomicBool::new(false));
        let (tx, mut rx) = mpsc::channel(8);

        let flag = Arc::clone(&granted);
        let poller = tokio::spawn(run_poller(
            move || flag.load(Ordering::SeqCst),
            Signal::Authorized,
            false,
            Duration::from_millis(500),
            tx,
        ));

        time::sleep(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_err());

        granted.store(true, Ordering::SeqCst);
        assert_eq!(rx.recv().await, Some(Signal::Authorized(true)));

        time::sleep(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_err());

        granted.store(false, Ordering::SeqCst);
        assert_eq!(rx.recv().await, Some(Signal::Authorized(false)));

        poller.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_focus_poller_reports_initial_mismatch() {
        let (tx, mut rx) = mpsc::channel(8);

        // Started believing the file manager is in front, but it is not
        let every = Duration::from_millis(250);
        let focused = run_poller(|| false, Signal::TargetFocused, true, every, tx);
        let poller = tokio::spawn(focused);

        assert_eq!(rx.recv().await, Some(Signal::TargetFocused(false)));
        time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());

        poller.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_exits_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let every = Duration::from_millis(500);
        run_poller(|| true, Signal::Authorized, false, every, tx).await;
    }
}
