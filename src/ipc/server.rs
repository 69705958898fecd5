//! Unix domain socket server for IPC
//!
//! Provides request-response communication and push notifications of cut
//! events to subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::cut::CutStateMachine;
use crate::events::CutEvent;
use crate::signals::{Signal, Signals};

use super::protocol::{read_frame, write_frame, DaemonStatus, Notification, Request, Response};

/// Handles to the daemon core shared by every client
#[derive(Clone)]
pub struct DaemonHandles {
    pub cut_state: Arc<CutStateMachine>,
    pub signals: Arc<Signals>,
    pub signal_tx: mpsc::Sender<Signal>,
    pub event_tx: broadcast::Sender<CutEvent>,
}

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    state: Arc<RwLock<ServerState>>,
    shutdown_tx: broadcast::Sender<()>,
    handles: DaemonHandles,
}

/// Shared server state
struct ServerState {
    start_time: std::time::Instant,
    tap_running: bool,
}

impl Server {
    /// Create a new IPC server bound to `socket_path`
    pub fn new(socket_path: &Path, handles: DaemonHandles) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path)
                .context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path)
            .context("failed to bind Unix socket")?;

        // Owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))
                .context("failed to restrict socket permissions")?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        let state = Arc::new(RwLock::new(ServerState {
            start_time: std::time::Instant::now(),
            tap_running: false,
        }));

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            state,
            shutdown_tx,
            handles,
        })
    }

    /// Record whether the event tap is installed
    pub async fn set_tap_running(&self, running: bool) {
        let mut state = self.state.write().await;
        if state.tap_running != running {
            info!(running, "IPC server: tap status updated");
        }
        state.tap_running = running;
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let state = Arc::clone(&self.state);
                    let handles = self.handles.clone();
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, state, handles) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(
        stream: UnixStream,
        state: Arc<RwLock<ServerState>>,
        handles: DaemonHandles,
    ) -> Result<()> {
        let (mut reader, mut writer) = stream.into_split();

        // Reading runs on its own task so pushes are never stuck behind a
        // half-received frame
        let (request_tx, mut request_rx) = mpsc::channel::<serde_json::Result<Request>>(8);
        let read_task = tokio::spawn(async move {
            loop {
                match read_frame(&mut reader).await {
                    Ok(Some(body)) => {
                        let request = serde_json::from_slice(&body);
                        if request_tx.send(request).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("client disconnected");
                        break;
                    }
                    Err(e) => {
                        warn!(?e, "bad frame, disconnecting");
                        break;
                    }
                }
            }
        });

        let mut events: Option<broadcast::Receiver<CutEvent>> = None;

        let result = loop {
            tokio::select! {
                incoming = request_rx.recv() => {
                    let Some(incoming) = incoming else {
                        break Ok(());
                    };

                    let response = match incoming {
                        Ok(request) => {
                            debug!(?request, "received request");
                            let (response, subscribe) =
                                Self::process_request(request, &state, &handles).await;
                            if subscribe && events.is_none() {
                                events = Some(handles.event_tx.subscribe());
                                debug!("client subscribed to notifications");
                            }
                            response
                        }
                        Err(e) => Response::error("bad_request", e.to_string()),
                    };

                    if let Err(e) = write_frame(&mut writer, &response).await {
                        break Err(e);
                    }
                }
                event = next_event(&mut events) => match event {
                    Ok(event) => {
                        let note = Notification::Event { event };
                        if let Err(e) = write_frame(&mut writer, &note).await {
                            break Err(e);
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!(skipped = n, "subscriber lagged, notifications dropped");
                    }
                    Err(RecvError::Closed) => {
                        events = None;
                    }
                },
            }
        };

        read_task.abort();
        result
    }

    /// Process a request and return a response
    /// Returns (Response, should_subscribe)
    async fn process_request(
        request: Request,
        state: &Arc<RwLock<ServerState>>,
        handles: &DaemonHandles,
    ) -> (Response, bool) {
        match request {
            Request::Ping => (Response::Pong, false),

            Request::GetStatus => {
                let state = state.read().await;
                (Response::Status(Self::status(&state, handles)), false)
            }

            Request::Subscribe => (Response::Subscribed, true),

            Request::CancelCut => {
                if handles.cut_state.deactivate() {
                    info!("cut cancelled via IPC");
                }
                (Response::Ack, false)
            }

            Request::ToggleCut => {
                handles.cut_state.toggle();
                (Response::Ack, false)
            }

            Request::SetAuthorized { authorized } => {
                let signal = Signal::Authorized(authorized);
                Self::forward(handles, signal).await
            }

            Request::SetFeatureEnabled { enabled } => {
                let signal = Signal::FeatureEnabled(enabled);
                Self::forward(handles, signal).await
            }

            Request::SetTargetFocused { focused } => {
                let signal = Signal::TargetFocused(focused);
                Self::forward(handles, signal).await
            }
        }
    }

    async fn forward(handles: &DaemonHandles, signal: Signal) -> (Response, bool) {
        match handles.signal_tx.send(signal).await {
            Ok(()) => (Response::Ack, false),
            Err(_) => (
                Response::error("unavailable", "tap controller is not running"),
                false,
            ),
        }
    }

    fn status(state: &ServerState, handles: &DaemonHandles) -> DaemonStatus {
        let cut = handles.cut_state.state();
        let context = handles.signals.context();

        DaemonStatus {
            cut_active: cut.is_active(),
            file_count: cut.operation().and_then(|op| op.file_count()),
            cut_age_secs: cut.operation().map(|op| op.age().as_secs()),
            tap_running: state.tap_running,
            authorized: context.authorized,
            feature_enabled: context.feature_enabled,
            target_focused: context.target_focused,
            uptime_secs: state.start_time.elapsed().as_secs(),
            ..DaemonStatus::default()
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

/// Next event for a subscribed client; pends forever otherwise
async fn next_event(
    events: &mut Option<broadcast::Receiver<CutEvent>>,
) -> Result<CutEvent, RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
