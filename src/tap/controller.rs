//! Event tap lifecycle and effect execution
//!
//! The controller is an actor: signal updates arrive on a channel and drive
//! the Stopped/Running lifecycle. While Running it owns the OS tap handle and
//! an effect executor task that performs the delayed half of every consumed
//! shortcut.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cut::CutStateMachine;
use crate::events::CutEvent;
use crate::inject::Injector;
use crate::signals::{Signal, Signals};

use super::classifier::Effect;
use super::keys::KeyChord;
use super::router::EventRouter;
use super::{EventTap, TapHandle};

/// Delays inside the cut and move sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectTiming {
    /// Between the simulated copy and arming cut mode
    pub settle_delay: Duration,
    /// Between disarming cut mode and simulating the move
    pub move_delay: Duration,
}

impl Default for EffectTiming {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(50),
            move_delay: Duration::from_millis(20),
        }
    }
}

/// Everything that exists only while the tap is Running
struct Running {
    handle: Box<dyn TapHandle>,
    executor: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

pub struct TapController {
    tap: Arc<dyn EventTap>,
    injector: Injector,
    cut_state: Arc<CutStateMachine>,
    signals: Arc<Signals>,
    event_tx: broadcast::Sender<CutEvent>,
    timing: EffectTiming,
    running: Option<Running>,
}

impl TapController {
    pub fn new(
        tap: Arc<dyn EventTap>,
        injector: Injector,
        cut_state: Arc<CutStateMachine>,
        signals: Arc<Signals>,
        event_tx: broadcast::Sender<CutEvent>,
        timing: EffectTiming,
    ) -> Self {
        Self {
            tap,
            injector,
            cut_state,
            signals,
            event_tx,
            timing,
            running: None,
        }
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Install the tap if the signals allow it.
    ///
    /// Failure leaves the controller Stopped; nothing retries until the next
    /// signal edge. Must be called from within the tokio runtime.
    pub fn start(&mut self) -> bool {
        if self.running.is_some() {
            return true;
        }

        if !self.signals.tap_allowed() {
            debug!(context = ?self.signals.context(), "tap not allowed, staying stopped");
            return false;
        }

        let (effect_tx, effect_rx) = mpsc::unbounded_channel();
        let router = Arc::new(EventRouter::new(
            Arc::clone(&self.signals),
            Arc::clone(&self.cut_state),
            effect_tx,
        ));

        let handle = match self.tap.install(router) {
            Ok(handle) => handle,
            Err(e) => {
                warn!(?e, "event tap unavailable, keystrokes pass through untouched");
                return false;
            }
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let executor = tokio::spawn(run_effects(
            effect_rx,
            shutdown_rx,
            self.injector.clone(),
            Arc::clone(&self.cut_state),
            self.event_tx.clone(),
            self.timing,
        ));

        self.running = Some(Running {
            handle,
            executor,
            shutdown_tx,
        });

        info!("event tap running");
        let _ = self.event_tx.send(CutEvent::TapStarted);
        true
    }

    /// Remove the tap. Effects it already swallowed a key for still run.
    pub fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        running.handle.stop();
        // The executor finishes every effect it already accepted, then exits
        let _ = running.shutdown_tx.send(true);
        drop(running.executor);

        info!("event tap stopped");
        let _ = self.event_tx.send(CutEvent::TapStopped);
    }

    pub fn restart(&mut self) -> bool {
        self.stop();
        self.start()
    }

    /// Apply one signal update
    pub fn apply(&mut self, signal: Signal) {
        let previous = self.signals.apply(signal);

        match signal {
            Signal::Authorized(now) if now != previous => {
                info!(authorized = now, "authorization changed");
                if now {
                    self.restart();
                } else {
                    self.stop();
                }
            }
            Signal::FeatureEnabled(now) if now != previous => {
                info!(enabled = now, "feature toggled");
                self.restart();
            }
            Signal::TargetFocused(now) if now != previous => {
                debug!(focused = now, "target focus changed");
            }
            _ => {}
        }
    }

    /// Process signal updates until every sender is gone
    pub async fn run(&mut self, mut signal_rx: mpsc::Receiver<Signal>) {
        let running = self.start();
        info!(running, "tap controller started");

        while let Some(signal) = signal_rx.recv().await {
            self.apply(signal);
        }

        self.stop();
        info!("tap controller stopped");
    }
}

/// Perform consumed effects in the order they were scheduled.
///
/// Every effect that reached the queue was paid for with a swallowed
/// keystroke, so it always runs to completion. Shutdown only closes the
/// queue: the router then passes new events through, and whatever is
/// already queued is drained before the task exits.
async fn run_effects(
    mut effect_rx: mpsc::UnboundedReceiver<Effect>,
    mut shutdown_rx: watch::Receiver<bool>,
    injector: Injector,
    cut_state: Arc<CutStateMachine>,
    event_tx: broadcast::Sender<CutEvent>,
    timing: EffectTiming,
) {
    debug!("effect executor started");
    let mut closing = false;

    loop {
        let effect = tokio::select! {
            effect = effect_rx.recv() => match effect {
                Some(effect) => effect,
                None => break,
            },
            _ = shutdown_rx.changed(), if !closing => {
                effect_rx.close();
                closing = true;
                debug!("effect queue closed, draining accepted effects");
                continue;
            }
        };

        perform(effect, &injector, &cut_state, &event_tx, timing)
            .await;
    }

    debug!("effect executor stopped");
}

async fn perform(
    effect: Effect,
    injector: &Injector,
    cut_state: &CutStateMachine,
    event_tx: &broadcast::Sender<CutEvent>,
    timing: EffectTiming,
) {
    match effect {
        Effect::BeginCut => {
            if let Err(e) = injector.inject(KeyChord::COPY).await {
                warn!(?e, "copy simulation failed, cut not armed");
                return;
            }
            tokio::time::sleep(timing.settle_delay).await;
            cut_state.activate(None);
            let _ = event_tx.send(CutEvent::CutPerformed);
        }
        Effect::CompleteMove => {
            // Cut mode was already disarmed by the router
            tokio::time::sleep(timing.move_delay).await;
            match injector.inject(KeyChord::MOVE).await {
                Ok(()) => {
                    let _ = event_tx.send(CutEvent::MovePerformed);
                }
                Err(e) => warn!(?e, "move simulation failed"),
            }
        }
    }
}
