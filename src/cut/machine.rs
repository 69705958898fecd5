//! Shared cut-state machine
//!
//! Single writer of [`CutState`]. The event tap thread, the staleness
//! sweeper and IPC cancel requests all hold an `Arc` to the same machine;
//! transitions are serialized by one lock and every change of the state tag
//! is published on the event channel.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::events::CutEvent;

use super::operation::{CutOperation, CutState};

pub struct CutStateMachine {
    state: Mutex<CutState>,
    event_tx: broadcast::Sender<CutEvent>,
}

impl CutStateMachine {
    /// Create a machine in the Inactive state
    pub fn new(event_tx: broadcast::Sender<CutEvent>) -> Self {
        Self {
            state: Mutex::new(CutState::Inactive),
            event_tx,
        }
    }

    /// Consistent snapshot of the current state
    pub fn state(&self) -> CutState {
        *self.state.lock()
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().is_active()
    }

    /// Arm a fresh cut, replacing any operation already armed
    pub fn activate(&self, file_count: Option<i64>) {
        let mut state = self.state.lock();
        let was_active = state.is_active();
        *state = CutState::Active(CutOperation::new(file_count));

        if was_active {
            debug!(?file_count, "cut operation replaced");
        } else {
            self.publish_change(CutState::Inactive, *state);
        }
    }

    /// Drop the armed cut. Returns whether anything changed.
    pub fn deactivate(&self) -> bool {
        let mut state = self.state.lock();
        if !state.is_active() {
            return false;
        }

        let old = std::mem::replace(&mut *state, CutState::Inactive);
        self.publish_change(old, CutState::Inactive);
        true
    }

    pub fn toggle(&self) {
        let mut state = self.state.lock();
        let old = *state;
        *state = match old {
            CutState::Active(_) => CutState::Inactive,
            CutState::Inactive => CutState::Active(CutOperation::new(None)),
        };
        self.publish_change(old, *state);
    }

    /// Expire the armed cut if it is no longer recent at `now`.
    /// Returns whether the cut was expired.
    pub fn sweep_stale_at(&self, now: Instant) -> bool {
        let mut state = self.state.lock();
        let CutState::Active(operation) = *state else {
            return false;
        };
        if operation.is_recent_at(now) {
            return false;
        }

        info!(
            age_secs = operation.age_at(now).as_secs(),
            "expiring stale cut"
        );
        *state = CutState::Inactive;
        self.publish_change(CutState::Active(operation), CutState::Inactive);
        true
    }

    pub fn sweep_stale(&self) -> bool {
        self.sweep_stale_at(Instant::now())
    }

    /// Run the periodic staleness sweep until the task is dropped
    pub async fn run_sweeper(self: Arc<Self>, every: Duration) {
        let mut ticker = time::interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(interval_secs = every.as_secs(), "staleness sweeper started");
        loop {
            ticker.tick().await;
            self.sweep_stale();
        }
    }

    /// Called with the lock held so notifications keep transition order
    fn publish_change(&self, from: CutState, to: CutState) {
        info!(from = %from, to = %to, "cut state transition");

        let event = CutEvent::CutStateChanged {
            active: to.is_active(),
            file_count: to.operation().and_then(|op| op.file_count()),
        };
        // No receivers is fine: nobody is watching yet
        let _ = self.event_tx.send(event);
    }
}
