//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::events::CutEvent;

/// Largest accepted frame body
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Requests from UI to daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request current daemon status
    GetStatus,

    /// Ping to check connectivity
    Ping,

    /// Subscribe to cut event notifications
    Subscribe,

    /// Drop the armed cut (menu "cancel")
    CancelCut,

    /// Arm or disarm cut mode by hand
    ToggleCut,

    /// Accessibility permission changed
    SetAuthorized { authorized: bool },

    /// User switched the feature on or off
    SetFeatureEnabled { enabled: bool },

    /// File manager gained or lost focus
    SetTargetFocused { focused: bool },
}

/// Responses from daemon to UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current daemon status
    Status(DaemonStatus),

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Command accepted
    Ack,

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Push notification from daemon to UI (for subscribed clients)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Event { event: CutEvent },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Whether a cut is armed
    pub cut_active: bool,

    /// File count of the armed cut, when known
    pub file_count: Option<i64>,

    /// Age of the armed cut in seconds
    pub cut_age_secs: Option<u64>,

    /// Whether the event tap is installed
    pub tap_running: bool,

    pub authorized: bool,
    pub feature_enabled: bool,
    pub target_focused: bool,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            cut_active: false,
            file_count: None,
            cut_age_secs: None,
            tap_running: false,
            authorized: false,
            feature_enabled: false,
            target_focused: false,
            uptime_secs: 0,
        }
    }
}

/// Read one frame body. `Ok(None)` means the peer closed cleanly.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        bail!("frame of {len} bytes exceeds limit");
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

/// Send a length-prefixed JSON message
pub async fn write_frame<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serde_json::to_vec(msg)?;
    let len = (body.len() as u32).to_le_bytes();

    writer.write_all(&len).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;

    fn framed(body: &[u8]) -> Vec<u8> {
        let mut out = (body.len() as u32).to_le_bytes().to_vec();
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn test_request_serialization() {
        let req = Request::SetTargetFocused { focused: true };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("set_target_focused"));
        assert!(json.contains("\"focused\":true"));
    }

    #[test]
    fn test_request_deserialization() {
        let json = r#"{"type":"cancel_cut"}"#;
        let req: Request = serde_json::from_str(json).unwrap();
        assert_eq!(req, Request::CancelCut);
    }

    #[test]
    fn test_response_serialization() {
        let resp = Response::Status(DaemonStatus::default());
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("status"));
        assert!(json.contains("tap_running"));
    }

    #[test]
    fn test_notification_serialization() {
        let note = Notification::Event {
            event: CutEvent::MovePerformed,
        };
        let json = serde_json::to_string(&note).unwrap();
        assert_eq!(
            json,
            r#"{"type":"event","event":{"type":"move_performed"}}"#
        );
    }

    #[tokio::test]
    async fn test_read_frame() {
        let body = br#"{"type":"ping"}"#;
        let mut mock = Builder::new().read(&framed(body)).build();

        let frame = read_frame(&mut mock).await.unwrap().unwrap();
        assert_eq!(frame, body);
        assert!(read_frame(&mut mock).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_frame_rejects_oversized() {
        let len = ((MAX_FRAME_LEN + 1) as u32).to_le_bytes();
        let mut mock = Builder::new().read(&len).build();
        assert!(read_frame(&mut mock).await.is_err());
    }

    #[tokio::test]
    async fn test_write_frame() {
        let body = br#"{"type":"pong"}"#;
        let mut mock = Builder::new()
            .write(&(body.len() as u32).to_le_bytes())
            .write(body)
            .build();

        write_frame(&mut mock, &Response::Pong).await.unwrap();
    }
}
