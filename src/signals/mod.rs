//! External signals consumed by the event tap
//!
//! Three booleans owned by collaborators outside the daemon core:
//! - authorized: the process may observe and post system input
//! - feature_enabled: the user has the cut gesture switched on
//! - target_focused: the file manager is the frontmost application
//!
//! Authorization and focus are polled from the OS by default; every signal
//! can also be pushed over IPC by the menu bar app.

mod focus;
mod permission;
mod poll;

use std::sync::atomic::{AtomicBool, Ordering};

use crate::tap::Context;

pub use focus::is_target_frontmost;
pub use permission::is_process_trusted;
pub use poll::run_poller;

/// A signal update delivered to the tap controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Authorized(bool),
    FeatureEnabled(bool),
    TargetFocused(bool),
}

/// Latest value of every signal, readable from the tap callback without locking
#[derive(Debug, Default)]
pub struct Signals {
    authorized: AtomicBool,
    feature_enabled: AtomicBool,
    target_focused: AtomicBool,
}

impl Signals {
    pub fn new(authorized: bool, feature_enabled: bool, target_focused: bool) -> Self {
        Self {
            authorized: AtomicBool::new(authorized),
            feature_enabled: AtomicBool::new(feature_enabled),
            target_focused: AtomicBool::new(target_focused),
        }
    }

    /// Snapshot for one classification
    pub fn context(&self) -> Context {
        Context {
            authorized: self.authorized.load(Ordering::SeqCst),
            feature_enabled: self.feature_enabled.load(Ordering::SeqCst),
            target_focused: self.target_focused.load(Ordering::SeqCst),
        }
    }

    /// Store a new value and return the previous one
    pub fn apply(&self, signal: Signal) -> bool {
        let (slot, value) = match signal {
            Signal::Authorized(v) => (&self.authorized, v),
            Signal::FeatureEnabled(v) => (&self.feature_enabled, v),
            Signal::TargetFocused(v) => (&self.target_focused, v),
        };
        slot.swap(value, Ordering::SeqCst)
    }

    /// Both conditions for holding a tap at all
    pub fn tap_allowed(&self) -> bool {
        let context = self.context();
        context.authorized && context.feature_enabled
    }
}
