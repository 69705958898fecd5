//! Events published to observers (menu bar icon, toasts)
//!
//! Emitted by the cut-state machine on every change of cut mode and by the
//! effect executor once a cut or move sequence has been delivered.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CutEvent {
    /// Cut mode switched on or off
    CutStateChanged {
        /// Whether a cut is now armed
        active: bool,
        /// File count of the armed operation, when known
        file_count: Option<i64>,
    },

    /// Copy was simulated and cut mode armed
    CutPerformed,

    /// Move shortcut was delivered to the file manager
    MovePerformed,

    /// Event tap installed and enabled
    TapStarted,

    /// Event tap removed
    TapStopped,
}

impl std::fmt::Display for CutEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CutEvent::CutStateChanged { active: true, .. } => write!(f, "CUT_MODE_ON"),
            CutEvent::CutStateChanged { active: false, .. } => write!(f, "CUT_MODE_OFF"),
            CutEvent::CutPerformed => write!(f, "CUT_PERFORMED"),
            CutEvent::MovePerformed => write!(f, "MOVE_PERFORMED"),
            CutEvent::TapStarted => write!(f, "TAP_STARTED"),
            CutEvent::TapStopped => write!(f, "TAP_STOPPED"),
        }
    }
}
