//! Routes tapped events through the classifier
//!
//! Runs inside the tap callback. Everything here is lock-light and
//! non-blocking: delayed work is handed to the effect executor.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::cut::CutStateMachine;
use crate::signals::Signals;

use super::classifier::{classify, Classification, Effect};
use super::keys::KeyEvent;

/// What the tap should do with the original event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Keep,
    Drop,
}

pub struct EventRouter {
    signals: Arc<Signals>,
    cut_state: Arc<CutStateMachine>,
    effect_tx: mpsc::UnboundedSender<Effect>,
}

impl EventRouter {
    pub fn new(
        signals: Arc<Signals>,
        cut_state: Arc<CutStateMachine>,
        effect_tx: mpsc::UnboundedSender<Effect>,
    ) -> Self {
        Self {
            signals,
            cut_state,
            effect_tx,
        }
    }

    pub fn route(&self, event: &KeyEvent) -> Verdict {
        let context = self.signals.context();
        let decision = classify(event, context, self.cut_state.is_active());
        trace!(?event, ?decision, "key event classified");

        match decision {
            Classification::PassThrough => Verdict::Keep,
            Classification::PassThroughClearingCut => {
                if self.cut_state.deactivate() {
                    debug!("copy abandoned the armed cut");
                }
                Verdict::Keep
            }
            Classification::Consume(effect) => self.consume(effect),
        }
    }

    fn consume(&self, effect: Effect) -> Verdict {
        // Never swallow a keystroke nobody will act on
        if self.effect_tx.is_closed() {
            warn!(?effect, "effect executor gone, passing event through");
            return Verdict::Keep;
        }

        // Disarm before the move is posted: the synthetic Cmd+Option+V comes
        // back through this router and must find cut mode already off.
        // Losing the race to the sweeper or a cancel means plain paste.
        if effect == Effect::CompleteMove && !self.cut_state.deactivate() {
            debug!("cut cleared concurrently, treating as plain paste");
            return Verdict::Keep;
        }

        if self.effect_tx.send(effect).is_err() {
            warn!(?effect, "failed to schedule effect, passing event through");
            return Verdict::Keep;
        }

        debug!(?effect, "key event consumed");
        Verdict::Drop
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::broadcast;

    use super::*;
    use crate::events::CutEvent;
    use crate::signals::Signal;
    use crate::tap::keys::{keycode, KeyChord, Modifiers};

    struct Harness {
        router: EventRouter,
        signals: Arc<Signals>,
        cut_state: Arc<CutStateMachine>,
        effect_rx: mpsc::UnboundedReceiver<Effect>,
        _events: broadcast::Receiver<CutEvent>,
    }

    fn cmd(code: u16) -> KeyEvent {
        KeyEvent::key_down(code, Modifiers::COMMAND)
    }

    fn harness() -> Harness {
        let (event_tx, events) = broadcast::channel(16);
        let (effect_tx, effect_rx) = mpsc::unbounded_channel();
        let signals = Arc::new(Signals::new(true, true, true));
        let cut_state = Arc::new(CutStateMachine::new(event_tx));
        Harness {
            router: EventRouter::new(Arc::clone(&signals), Arc::clone(&cut_state), effect_tx),
            signals,
            cut_state,
            effect_rx,
            _events: events,
        }
    }

    #[test]
    fn test_cmd_x_is_dropped_and_scheduled() {
        let mut h = harness();
        let verdict = h.router.route(&cmd(keycode::X));

        assert_eq!(verdict, Verdict::Drop);
        assert_eq!(h.effect_rx.try_recv().ok(), Some(Effect::BeginCut));
        // Arming waits for the copy to settle
        assert!(!h.cut_state.is_active());
    }

    #[test]
    fn test_cmd_v_deactivates_before_scheduling_move() {
        let mut h = harness();
        h.cut_state.activate(None);

        let verdict = h.router.route(&cmd(keycode::V));

        assert_eq!(verdict, Verdict::Drop);
        assert!(!h.cut_state.is_active());
        assert_eq!(h.effect_rx.try_recv().ok(), Some(Effect::CompleteMove));
    }

    #[test]
    fn test_synthetic_move_reentry_passes_through() {
        let mut h = harness();
        h.cut_state.activate(None);
        h.router.route(&cmd(keycode::V));
        h.effect_rx.try_recv().ok();

        let reentry = KeyEvent::key_down(KeyChord::MOVE.keycode, KeyChord::MOVE.modifiers);
        assert_eq!(h.router.route(&reentry), Verdict::Keep);
        // A second Cmd+V is now a plain paste
        assert_eq!(h.router.route(&cmd(keycode::V)), Verdict::Keep);
        assert!(h.effect_rx.try_recv().is_err());
    }

    #[test]
    fn test_cmd_c_clears_cut_and_passes_through() {
        let mut h = harness();
        h.cut_state.activate(Some(4));

        let verdict = h.router.route(&cmd(keycode::C));

        assert_eq!(verdict, Verdict::Keep);
        assert!(!h.cut_state.is_active());
        assert!(h.effect_rx.try_recv().is_err());
    }

    #[test]
    fn test_unfocused_target_is_transparent() {
        let mut h = harness();
        h.signals.apply(Signal::TargetFocused(false));
        h.cut_state.activate(None);

        for code in [keycode::X, keycode::V, keycode::C] {
            let verdict = h.router.route(&cmd(code));
            assert_eq!(verdict, Verdict::Keep);
        }
        assert!(h.cut_state.is_active());
        assert!(h.effect_rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_executor_never_swallows() {
        let h = harness();
        h.cut_state.activate(None);
        drop(h.effect_rx);

        assert_eq!(h.router.route(&cmd(keycode::X)), Verdict::Keep);
        assert_eq!(h.router.route(&cmd(keycode::V)), Verdict::Keep);
        assert!(h.cut_state.is_active());
    }
}
