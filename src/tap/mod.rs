//! Global key interception
//!
//! Uses a macOS CGEventTap scoped to key-down events. Each event is routed
//! through the classifier; consumed events are swallowed and their effects
//! run on the tokio runtime, never on the tap thread.

mod classifier;
mod controller;
mod keys;
#[cfg(target_os = "macos")]
mod macos;
mod router;

use std::sync::Arc;

pub use classifier::Context;
pub use controller::{EffectTiming, TapController};
pub use keys::KeyChord;
use router::EventRouter;

#[cfg(target_os = "macos")]
use macos::CgEventTap;

/// Errors that can occur while installing the event tap
#[derive(Debug, thiserror::Error)]
pub enum TapError {
    #[error("failed to create event tap - check Accessibility permissions")]
    EventTapCreation,

    #[error("failed to create run loop source for event tap")]
    RunLoopSource,

    #[error("failed to spawn event tap thread: {0}")]
    ThreadSpawn(String),

    #[error("event tap thread exited before reporting readiness")]
    ThreadExited,

    #[error("event taps are not supported on this platform")]
    Unsupported,
}

/// OS facility that delivers key-down events to a router and honours its verdicts
pub trait EventTap: Send + Sync {
    /// Create, register and enable an interception handle.
    ///
    /// Blocks only until the OS has accepted or refused the tap.
    fn install(&self, router: Arc<EventRouter>) -> Result<Box<dyn TapHandle>, TapError>;
}

/// A live interception handle
pub trait TapHandle: Send {
    /// Disable the tap and release it. Events still in flight pass through.
    fn stop(self: Box<Self>);
}

/// Fallback for platforms without an event tap: installation always fails,
/// which leaves every keystroke untouched
#[cfg(any(test, not(target_os = "macos")))]
pub struct UnsupportedTap;

#[cfg(any(test, not(target_os = "macos")))]
impl EventTap for UnsupportedTap {
    fn install(&self, _router: Arc<EventRouter>) -> Result<Box<dyn TapHandle>, TapError> {
        Err(TapError::Unsupported)
    }
}

/// Event tap for the current platform
pub fn platform_tap() -> Arc<dyn EventTap> {
    #[cfg(target_os = "macos")]
    {
        Arc::new(CgEventTap)
    }
    #[cfg(not(target_os = "macos"))]
    {
        Arc::new(UnsupportedTap)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::keys::KeyEvent;
    use super::router::Verdict;
    use super::*;
    use crate::inject::testing::RecordingPoster;
    use crate::inject::{InjectError, KeyPoster};

    /// In-memory tap: tests feed events straight into the installed router
    #[derive(Default)]
    pub struct FakeTap {
        pub refuse: AtomicBool,
        pub installs: AtomicUsize,
        pub stops: Arc<AtomicUsize>,
        router: Mutex<Option<Arc<EventRouter>>>,
        live: Arc<AtomicBool>,
    }

    impl FakeTap {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn is_live(&self) -> bool {
            self.live.load(Ordering::SeqCst)
        }

        /// Deliver an event the way the OS would. Without a live tap the
        /// event is never seen and therefore passes through.
        pub fn deliver(&self, event: KeyEvent) -> Verdict {
            if !self.is_live() {
                return Verdict::Keep;
            }
            match self.router.lock().as_ref() {
                Some(router) => router.route(&event),
                None => Verdict::Keep,
            }
        }
    }

    /// Records posted events and feeds every synthetic key-down back
    /// through the tap, the way the OS hands posted input to our own tap
    pub struct LoopbackPoster {
        tap: Arc<FakeTap>,
        pub recorder: RecordingPoster,
        pub looped: Mutex<Vec<Verdict>>,
    }

    impl LoopbackPoster {
        pub fn new(tap: Arc<FakeTap>) -> Self {
            Self {
                tap,
                recorder: RecordingPoster::new(),
                looped: Mutex::new(Vec::new()),
            }
        }
    }

    impl KeyPoster for LoopbackPoster {
        fn post(&self, chord: KeyChord, key_down: bool) -> Result<(), InjectError> {
            self.recorder.post(chord, key_down)?;
            if key_down {
                let verdict = self
                    .tap
                    .deliver(KeyEvent::key_down(chord.keycode, chord.modifiers));
                self.looped.lock().push(verdict);
            }
            Ok(())
        }
    }

    struct FakeHandle {
        live: Arc<AtomicBool>,
        stops: Arc<AtomicUsize>,
    }

    impl TapHandle for FakeHandle {
        fn stop(self: Box<Self>) {
            self.live.store(false, Ordering::SeqCst);
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl EventTap for FakeTap {
        fn install(&self, router: Arc<EventRouter>) -> Result<Box<dyn TapHandle>, TapError> {
            if self.refuse.load(Ordering::SeqCst) {
                return Err(TapError::EventTapCreation);
            }
            self.installs.fetch_add(1, Ordering::SeqCst);
            *self.router.lock() = Some(router);
            self.live.store(true, Ordering::SeqCst);
            Ok(Box::new(FakeHandle {
                live: Arc::clone(&self.live),
                stops: Arc::clone(&self.stops),
            }))
        }
    }
}
