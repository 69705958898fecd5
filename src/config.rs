//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::tap::EffectTiming;

/// Timing knobs of the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Gap between a synthetic key-down and its key-up
    pub key_dwell: Duration,
    /// Delays inside the cut and move sequences
    pub effects: EffectTiming,
    /// How often armed cuts are checked for staleness
    pub sweep_interval: Duration,
    /// How often the Accessibility trust flag is polled
    pub permission_poll: Duration,
    /// How often the frontmost application is checked
    pub focus_poll: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            key_dwell: Duration::from_millis(10),
            effects: EffectTiming::default(),
            sweep_interval: Duration::from_secs(60),
            permission_poll: Duration::from_millis(500),
            focus_poll: Duration::from_millis(250),
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Initial value of the feature-enabled signal
    pub feature_enabled: bool,

    /// Initial value of the target-focused signal when focus is not polled
    pub target_focused: bool,

    /// Poll the Accessibility trust flag instead of waiting for IPC updates
    pub poll_permission: bool,

    /// Track the frontmost application instead of waiting for IPC updates
    pub poll_focus: bool,

    pub timing: Timing,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let home = lookup("HOME").context("HOME is not set")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("cutmove");

        let socket_path = match lookup("CUTMOVE_SOCKET") {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => data_dir.join("daemon.sock"),
        };

        Ok(Self {
            socket_path,
            data_dir,
            feature_enabled: flag(&lookup, "CUTMOVE_ENABLED", true)?,
            target_focused: flag(&lookup, "CUTMOVE_TARGET_FOCUSED", false)?,
            poll_permission: flag(&lookup, "CUTMOVE_POLL_PERMISSION", true)?,
            poll_focus: flag(&lookup, "CUTMOVE_POLL_FOCUS", true)?,
            timing: Timing::default(),
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }
}

fn flag<F>(lookup: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{key} must be a boolean, got {other:?}"),
    }
}
