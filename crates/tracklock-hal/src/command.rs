//! Command channel – encodes `SET` lines and serialises writers.
//!
//! Each command is one ASCII line:
//!
//! ```text
//! SET <pan:%.3f> <tilt:%.3f> <laser:0|1>\n
//! ```
//!
//! The writer half sits behind an async mutex held for the whole
//! `write_all`, so concurrent callers can never interleave partial lines.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;
use tracklock_types::{AimError, Pose};

/// Format a pose command exactly as the controller expects it.
pub fn encode_set(pose: &Pose) -> String {
    format!(
        "SET {:.3} {:.3} {}\n",
        pose.pan,
        pose.tilt,
        u8::from(pose.emitter_on)
    )
}

/// Owns the outgoing direction of a controller connection.
pub struct CommandChannel<W> {
    writer: Mutex<Option<W>>,
}

impl<W> CommandChannel<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(Some(writer)),
        }
    }

    /// Encode and write one command line.
    ///
    /// # Errors
    ///
    /// Returns [`AimError::Write`] when the channel has been shut down or the
    /// underlying write fails.
    pub async fn send(&self, pose: &Pose) -> Result<(), AimError> {
        let line = encode_set(pose);
        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| AimError::Write("controller session is closed".to_string()))?;

        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| AimError::Write(format!("failed to send {:?}: {e}", line.trim_end())))?;
        writer
            .flush()
            .await
            .map_err(|e| AimError::Write(format!("flush failed: {e}")))?;

        debug!(command = %line.trim_end(), "sent");
        Ok(())
    }

    /// Release the writer.  Later sends fail; repeated calls are no-ops.
    pub async fn shutdown(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            // Peer may already be gone; nothing useful to report.
            let _ = writer.shutdown().await;
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.writer.lock().await.is_none()
    }
}
