//! [`ControllerSession`] – one live connection to the motion controller.
//!
//! Connecting splits the TCP stream in two: the read half is moved into a
//! background [`TelemetryChannel`] task, the write half into a
//! [`CommandChannel`].  The two directions never share a lock; the only
//! shared resource is the [`TelemetryState`] pose snapshot.
//!
//! # Example
//!
//! ```rust,no_run
//! use tracklock_hal::ControllerSession;
//!
//! # async fn demo() -> Result<(), tracklock_types::AimError> {
//! let session = ControllerSession::connect("127.0.0.1", 9000).await?;
//! session.set_pose(10.0, -5.0, false).await?;
//! let pose = session.read_telemetry();
//! println!("controller reports pan={} tilt={}", pose.pan, pose.tilt);
//! session.close().await;
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::task::JoinHandle;
use tracing::{info, instrument};
use tracklock_types::{AimError, Pose};

use crate::command::CommandChannel;
use crate::controller::PointingController;
use crate::telemetry::{TelemetryChannel, TelemetryState};

/// How long [`ControllerSession::connect`] waits for the TCP handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A bidirectional session with the pan/tilt motion controller.
pub struct ControllerSession {
    addr: String,
    telemetry: Arc<TelemetryState>,
    commands: CommandChannel<OwnedWriteHalf>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl ControllerSession {
    /// Connect to `host:port` with [`DEFAULT_CONNECT_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns [`AimError::Connection`] if the connection cannot be opened.
    pub async fn connect(host: &str, port: u16) -> Result<Self, AimError> {
        Self::connect_timeout(host, port, DEFAULT_CONNECT_TIMEOUT).await
    }

    /// Connect to `host:port`, giving up after `timeout`.
    ///
    /// The background telemetry reader is started before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`AimError::Connection`] on refusal, resolution failure, or
    /// timeout.
    #[instrument(skip(timeout))]
    pub async fn connect_timeout(
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<Self, AimError> {
        let addr = format!("{host}:{port}");
        let stream = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| AimError::Connection {
                addr: addr.clone(),
                details: format!("timed out after {timeout:?}"),
            })?
            .map_err(|e| AimError::Connection {
                addr: addr.clone(),
                details: e.to_string(),
            })?;

        info!(%addr, "connected to motion controller");
        Ok(Self::from_stream(stream, addr))
    }

    /// Wrap an already connected stream and start its telemetry reader.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_stream(stream: TcpStream, addr: impl Into<String>) -> Self {
        // Small command lines; do not let Nagle hold them back.
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();

        let telemetry = TelemetryState::new();
        let reader = tokio::spawn(TelemetryChannel::new(Arc::clone(&telemetry)).run(read_half));

        Self {
            addr: addr.into(),
            telemetry,
            commands: CommandChannel::new(write_half),
            reader: Mutex::new(Some(reader)),
        }
    }

    /// The `host:port` this session was opened against.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Send a `SET` command.  Safe to call while telemetry is being received.
    ///
    /// # Errors
    ///
    /// Returns [`AimError::Write`] on I/O failure or after [`close`][Self::close].
    pub async fn set_pose(&self, pan: f64, tilt: f64, emitter_on: bool) -> Result<(), AimError> {
        self.commands
            .send(&Pose::new(pan, tilt, emitter_on))
            .await
    }

    /// Latest pose reported by the controller.
    ///
    /// Eventually consistent: a pose sent with [`set_pose`][Self::set_pose]
    /// shows up here only once the controller echoes it.
    pub fn read_telemetry(&self) -> Pose {
        self.telemetry.snapshot()
    }

    /// `false` once the telemetry reader has stopped (end-of-stream, read
    /// error, or [`close`][Self::close]).
    pub fn is_running(&self) -> bool {
        self.telemetry.is_running()
    }

    /// Stop the telemetry reader and release the connection.
    ///
    /// Idempotent.  Aborting the reader drops its half of the socket, so a
    /// pending read never keeps the session alive.
    pub async fn close(&self) {
        let reader = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = reader {
            handle.abort();
            info!(addr = %self.addr, "controller session closed");
        }
        self.telemetry.mark_stopped();
        self.commands.shutdown().await;
    }
}

impl Drop for ControllerSession {
    fn drop(&mut self) {
        if let Some(handle) = self
            .reader
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

#[async_trait]
impl PointingController for ControllerSession {
    async fn set_pose(&self, pan: f64, tilt: f64, emitter_on: bool) -> Result<(), AimError> {
        ControllerSession::set_pose(self, pan, tilt, emitter_on).await
    }

    fn telemetry(&self) -> Pose {
        self.read_telemetry()
    }

    fn is_alive(&self) -> bool {
        self.is_running()
    }

    fn endpoint(&self) -> &str {
        self.addr()
    }
}
