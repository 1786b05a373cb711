//! Local control channel: single-instance guard, command server and client.
//!
//! The daemon owns a Unix socket at a well-known path. A background task
//! accepts one connection at a time and reads newline-delimited action tokens;
//! known actions are acknowledged with `OK` and pushed onto the application's
//! FIFO queue, `ping` is answered in place, unknown tokens get an `ERR` reply
//! and the connection keeps serving. Short-lived CLI invocations use
//! [`send_action`] against the same path.

use crate::action::Action;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream, unix::OwnedWriteHalf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Acknowledgment token for an accepted action.
pub const ACK: &str = "OK";

/// Errors from the control channel.
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("failed to bind control socket {path}: {source}")]
    Bind { path: PathBuf, source: io::Error },

    #[error("no perevod instance is listening on {0}")]
    Unreachable(PathBuf),

    #[error("timed out waiting for a reply")]
    Timeout,

    #[error("connection closed without a reply")]
    EmptyReply,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result of the startup instance check.
#[derive(Debug)]
pub enum Outcome {
    /// No live instance found; the caller now owns the socket.
    Bound(ControlSocket),
    /// A live instance answered the probe; the caller must exit.
    AlreadyRunning,
}

/// The bound control socket, unlinked again when dropped.
#[derive(Debug)]
pub struct ControlSocket {
    listener: UnixListener,
    path: PathBuf,
}

impl ControlSocket {
    /// Path the socket is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ControlSocket {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Determine whether a prior instance is alive at `path` and bind if not.
///
/// A leftover socket file that answers the `ping` probe with [`ACK`] within
/// `probe_timeout` means another instance runs; anything else (refused
/// connection, timeout, garbage reply) marks the file stale, and it is
/// removed and rebound. Two processes racing here resolve via the second
/// bind attempt: the loser sees the winner's socket and reports
/// [`Outcome::AlreadyRunning`].
pub async fn ensure_single_instance(
    path: &Path,
    probe_timeout: Duration,
) -> Result<Outcome, ControlError> {
    match UnixListener::bind(path) {
        Ok(listener) => Ok(Outcome::Bound(ControlSocket {
            listener,
            path: path.to_path_buf(),
        })),
        Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
            match send_action(path, Action::Ping, probe_timeout).await {
                Ok(reply) if reply == ACK => Ok(Outcome::AlreadyRunning),
                Ok(reply) => {
                    warn!("Unexpected probe reply {reply:?}, reclaiming socket");
                    reclaim(path)
                }
                Err(e) => {
                    info!("Removing stale control socket {}: {e}", path.display());
                    reclaim(path)
                }
            }
        }
        Err(source) => Err(ControlError::Bind {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Remove a stale socket file and try to bind again.
fn reclaim(path: &Path) -> Result<Outcome, ControlError> {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            return Err(ControlError::Io(e));
        }
    }

    match UnixListener::bind(path) {
        Ok(listener) => Ok(Outcome::Bound(ControlSocket {
            listener,
            path: path.to_path_buf(),
        })),
        // Lost the rebind race against a concurrent startup.
        Err(e) if e.kind() == io::ErrorKind::AddrInUse => Ok(Outcome::AlreadyRunning),
        Err(source) => Err(ControlError::Bind {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Serve the control socket, forwarding accepted actions onto `queue`.
///
/// Connections are serviced one at a time; a failed connection is logged and
/// the accept loop continues. Runs until the task is dropped.
pub async fn serve(socket: ControlSocket, queue: mpsc::Sender<Action>) {
    info!("Control socket listening on {}", socket.path().display());

    loop {
        let stream = match socket.listener.accept().await {
            Ok((stream, _)) => stream,
            Err(e) => {
                warn!("Control socket accept failed: {e}");
                continue;
            }
        };

        if let Err(e) = handle_connection(stream, &queue).await {
            debug!("Control connection ended: {e}");
        }
    }
}

/// Service one connection: read tokens until the peer closes.
async fn handle_connection(
    stream: UnixStream,
    queue: &mpsc::Sender<Action>,
) -> io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let token = line.trim();
        if token.is_empty() {
            continue;
        }

        match Action::parse(token) {
            None => {
                warn!("Unknown action token: {token:?}");
                reply(&mut writer, &format!("ERR unknown action {token}")).await?;
            }
            Some(Action::Ping) => {
                reply(&mut writer, ACK).await?;
            }
            Some(action) => {
                debug!("Accepted action: {action}");
                if queue.send(action).await.is_err() {
                    // Application loop has exited; refuse further work.
                    reply(&mut writer, "ERR shutting down").await?;
                    return Ok(());
                }
                reply(&mut writer, ACK).await?;
            }
        }
    }

    Ok(())
}

async fn reply(writer: &mut OwnedWriteHalf, message: &str) -> io::Result<()> {
    writer.write_all(message.as_bytes()).await?;
    writer.write_all(b"\n").await
}

/// Send one action to a running instance and return its reply line.
pub async fn send_action(
    path: &Path,
    action: Action,
    timeout: Duration,
) -> Result<String, ControlError> {
    tokio::time::timeout(timeout, send_action_inner(path, action))
        .await
        .map_err(|_| ControlError::Timeout)?
}

async fn send_action_inner(path: &Path, action: Action) -> Result<String, ControlError> {
    let mut stream = UnixStream::connect(path)
        .await
        .map_err(|_| ControlError::Unreachable(path.to_path_buf()))?;

    stream.write_all(format!("{action}\n").as_bytes()).await?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(ControlError::EmptyReply);
    }

    Ok(line.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::task::JoinHandle;

    const PROBE: Duration = Duration::from_millis(500);

    fn sock(dir: &TempDir) -> PathBuf {
        dir.path().join("perevod.sock")
    }

    async fn start_server(path: &Path) -> (JoinHandle<()>, mpsc::Receiver<Action>) {
        let outcome = ensure_single_instance(path, PROBE).await.unwrap();
        let Outcome::Bound(socket) = outcome else {
            panic!("expected to bind a fresh socket");
        };
        let (tx, rx) = mpsc::channel(8);
        (tokio::spawn(serve(socket, tx)), rx)
    }

    #[tokio::test]
    async fn test_ping_round_trip_no_side_effect() {
        let dir = TempDir::new().unwrap();
        let path = sock(&dir);
        let (server, mut rx) = start_server(&path).await;

        let reply = send_action(&path, Action::Ping, PROBE).await.unwrap();
        assert_eq!(reply, ACK);
        assert!(rx.try_recv().is_err(), "ping must not reach the queue");

        server.abort();
    }

    #[tokio::test]
    async fn test_second_instance_detected() {
        let dir = TempDir::new().unwrap();
        let path = sock(&dir);
        let (server, _rx) = start_server(&path).await;

        let outcome = ensure_single_instance(&path, PROBE).await.unwrap();
        assert!(matches!(outcome, Outcome::AlreadyRunning));

        // The first instance keeps serving.
        let reply = send_action(&path, Action::Ping, PROBE).await.unwrap();
        assert_eq!(reply, ACK);

        server.abort();
    }

    #[tokio::test]
    async fn test_stale_socket_reclaimed() {
        let dir = TempDir::new().unwrap();
        let path = sock(&dir);

        // Bind and immediately close, leaving the file with no listener.
        let stale = std::os::unix::net::UnixListener::bind(&path).unwrap();
        drop(stale);
        assert!(path.exists());

        let outcome = ensure_single_instance(&path, PROBE).await.unwrap();
        assert!(matches!(outcome, Outcome::Bound(_)));
    }

    #[tokio::test]
    async fn test_socket_unlinked_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = sock(&dir);

        let outcome = ensure_single_instance(&path, PROBE).await.unwrap();
        let Outcome::Bound(socket) = outcome else {
            panic!("expected to bind");
        };
        assert!(path.exists());

        drop(socket);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_unknown_token_keeps_connection_usable() {
        let dir = TempDir::new().unwrap();
        let path = sock(&dir);
        let (server, mut rx) = start_server(&path).await;

        let stream = UnixStream::connect(&path).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        writer.write_all(b"frobnicate\n").await.unwrap();
        let reply = lines.next_line().await.unwrap().unwrap();
        assert!(reply.starts_with("ERR"), "got: {reply}");

        // Same connection still dispatches valid tokens.
        writer.write_all(b"hide\n").await.unwrap();
        let reply = lines.next_line().await.unwrap().unwrap();
        assert_eq!(reply, ACK);
        assert_eq!(rx.recv().await, Some(Action::Hide));

        server.abort();
    }

    #[tokio::test]
    async fn test_actions_drain_in_submission_order() {
        let dir = TempDir::new().unwrap();
        let path = sock(&dir);
        let (server, mut rx) = start_server(&path).await;

        let stream = UnixStream::connect(&path).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        writer.write_all(b"fetch\nhide\nreload\n").await.unwrap();
        for _ in 0..3 {
            assert_eq!(lines.next_line().await.unwrap().unwrap(), ACK);
        }

        assert_eq!(rx.recv().await, Some(Action::Fetch));
        assert_eq!(rx.recv().await, Some(Action::Hide));
        assert_eq!(rx.recv().await, Some(Action::Reload));

        server.abort();
    }

    #[tokio::test]
    async fn test_unreachable_socket_reported() {
        let dir = TempDir::new().unwrap();
        let path = sock(&dir);

        let err = send_action(&path, Action::Ping, PROBE).await.unwrap_err();
        assert!(matches!(err, ControlError::Unreachable(_)));
    }
}
