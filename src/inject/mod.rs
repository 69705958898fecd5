//! Synthetic key input
//!
//! [`KeyPoster`] is the platform primitive that posts one key event.
//! [`Injector`] turns it into a full press: key-down, a short dwell, key-up.

#[cfg(target_os = "macos")]
mod macos;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::tap::KeyChord;

#[cfg(target_os = "macos")]
use macos::CgKeyPoster;

/// Errors from posting synthetic events
#[derive(Debug, thiserror::Error)]
pub enum InjectError {
    #[error("failed to create event source")]
    EventSource,

    #[error("failed to create keyboard event for key 0x{0:02x}")]
    EventCreation(u16),

    #[error("synthetic input is not supported on this platform")]
    Unsupported,
}

/// Posts single key events into the system input stream
pub trait KeyPoster: Send + Sync {
    fn post(&self, chord: KeyChord, key_down: bool) -> Result<(), InjectError>;
}

/// Fallback for platforms without an input-synthesis backend
#[cfg(any(test, not(target_os = "macos")))]
pub struct UnsupportedPoster;

#[cfg(any(test, not(target_os = "macos")))]
impl KeyPoster for UnsupportedPoster {
    fn post(&self, _chord: KeyChord, _key_down: bool) -> Result<(), InjectError> {
        Err(InjectError::Unsupported)
    }
}

/// Poster for the current platform
pub fn platform_poster() -> Arc<dyn KeyPoster> {
    #[cfg(target_os = "macos")]
    {
        Arc::new(CgKeyPoster)
    }
    #[cfg(not(target_os = "macos"))]
    {
        Arc::new(UnsupportedPoster)
    }
}

/// Presses and releases chords with a fixed dwell between the two events
#[derive(Clone)]
pub struct Injector {
    poster: Arc<dyn KeyPoster>,
    dwell: Duration,
}

impl Injector {
    pub fn new(poster: Arc<dyn KeyPoster>, dwell: Duration) -> Self {
        Self { poster, dwell }
    }

    /// Press and release `chord`.
    ///
    /// Once the key-down is posted the key-up is always attempted, so a
    /// chord is never left held down.
    pub async fn inject(&self, chord: KeyChord) -> Result<(), InjectError> {
        self.poster.post(chord, true)?;
        tokio::time::sleep(self.dwell).await;

        let up = self.poster.post(chord, false);
        if let Err(e) = &up {
            warn!(%chord, ?e, "failed to post key-up");
        }
        debug!(%chord, "chord injected");
        up
    }
}
