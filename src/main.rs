//! cutmove-daemon: cut-and-move for the macOS file manager
//!
//! Runs as a LaunchAgent and provides:
//! - Global Cmd+X / Cmd+V interception via CGEventTap
//! - Cut mode tracking with automatic expiry of stale cuts
//! - IPC server for the menu bar app (signals, status, notifications)
//!
//! Cmd+X in the file manager is turned into a copy plus an armed cut;
//! the next Cmd+V is replaced by the system move shortcut (Cmd+Option+V).

mod config;
mod cut;
mod events;
mod inject;
mod ipc;
mod lifecycle;
mod signals;
mod tap;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::cut::CutStateMachine;
use crate::events::CutEvent;
use crate::inject::{platform_poster, Injector};
use crate::ipc::{DaemonHandles, Server};
use crate::lifecycle::ShutdownSignal;
use crate::signals::{is_process_trusted, is_target_frontmost, run_poller, Signal, Signals};
use crate::tap::{platform_tap, TapController};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "cutmove-daemon starting");

    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.socket_path, "configuration loaded");

    let shutdown = ShutdownSignal::new();

    // Cut state machine / tap controller -> IPC subscribers
    let (event_tx, _event_rx) = broadcast::channel::<CutEvent>(64);
    // IPC server / permission poller -> tap controller
    let (signal_tx, signal_rx) = mpsc::channel(32);

    let authorized = is_process_trusted();
    if !authorized {
        warn!("Accessibility permission not granted - keystrokes pass through until it is");
    }

    let target_focused = if config.poll_focus {
        is_target_frontmost()
    } else {
        config.target_focused
    };

    let cut_state = Arc::new(CutStateMachine::new(event_tx.clone()));
    let signals = Arc::new(Signals::new(
        authorized,
        config.feature_enabled,
        target_focused,
    ));

    let mut controller = TapController::new(
        platform_tap(),
        Injector::new(platform_poster(), config.timing.key_dwell),
        Arc::clone(&cut_state),
        Arc::clone(&signals),
        event_tx.clone(),
        config.timing.effects,
    );

    let server = Server::new(
        &config.socket_path,
        DaemonHandles {
            cut_state: Arc::clone(&cut_state),
            signals: Arc::clone(&signals),
            signal_tx: signal_tx.clone(),
            event_tx: event_tx.clone(),
        },
    )?;

    let sweep_every = config.timing.sweep_interval;
    let sweeper = Arc::clone(&cut_state).run_sweeper(sweep_every);
    let mut ipc_event_rx = event_tx.subscribe();
    let server_for_events = &server;

    let permission_poller = optional_poller(
        config.poll_permission,
        is_process_trusted,
        Signal::Authorized,
        authorized,
        config.timing.permission_poll,
        signal_tx.clone(),
    );
    let focus_poller = optional_poller(
        config.poll_focus,
        is_target_frontmost,
        Signal::TargetFocused,
        target_focused,
        config.timing.focus_poll,
        signal_tx.clone(),
    );
    // Only the server and the pollers keep the controller alive
    drop(signal_tx);

    info!("daemon initialized, entering main loop");

    tokio::select! {
        // Install the tap and follow signal edges
        _ = controller.run(signal_rx) => {
            info!("tap controller exited");
        }

        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        _ = sweeper => {}

        _ = permission_poller => {
            info!("permission poller exited");
        }

        _ = focus_poller => {
            info!("focus poller exited");
        }

        // Mirror tap status into the IPC server and log every event
        _ = async {
            loop {
                match ipc_event_rx.recv().await {
                    Ok(event) => {
                        info!(%event, "cut event");
                        let running = match event {
                            CutEvent::TapStarted => true,
                            CutEvent::TapStopped => false,
                            _ => continue,
                        };
                        server_for_events.set_tap_running(running).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "cut event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("cut event handler exited");
        }

        result = shutdown.wait() => {
            match result {
                Ok(()) => info!("shutdown signal received"),
                Err(e) => error!(?e, "shutdown handler failed"),
            }
        }
    }

    info!("shutting down...");

    controller.stop();
    server.shutdown().await;

    info!("cutmove-daemon stopped");

    Ok(())
}

/// Run a signal poller when enabled, otherwise pend without holding a sender
async fn optional_poller(
    enabled: bool,
    read: fn() -> bool,
    signal: fn(bool) -> Signal,
    initial: bool,
    every: Duration,
    signal_tx: mpsc::Sender<Signal>,
) {
    if enabled {
        run_poller(read, signal, initial, every, signal_tx).await;
    } else {
        drop(signal_tx);
        std::future::pending::<()>().await;
    }
}
