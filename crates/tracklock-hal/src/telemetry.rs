//! Telemetry channel – decodes the controller's `POS` stream.
//!
//! The controller reports its pose as newline-terminated ASCII lines:
//!
//! ```text
//! POS <pan> <tilt> <laser>\n
//! ```
//!
//! Bytes arrive in arbitrary chunks, so [`LineDecoder`] keeps the trailing
//! incomplete segment between reads.  Every complete line is handed to
//! [`parse_line`]; well-formed `POS` reports overwrite the shared
//! [`TelemetryState`] in a single critical section, everything else is
//! dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, trace, warn};
use tracklock_types::Pose;

/// Line tag of a position report.
pub const POSITION_TAG: &str = "POS";

/// Size of a single socket read.
const READ_CHUNK: usize = 1024;

/// Longest partial line kept while waiting for its terminator.
pub const MAX_LINE_LEN: usize = 4096;

// ────────────────────────────────────────────────────────────────────────────
// Line parsing
// ────────────────────────────────────────────────────────────────────────────

/// A `POS` line that could not be decoded.  Never leaves the telemetry task.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("POS report carries {found} field(s), expected 3")]
    MissingField { found: usize },

    #[error("POS field `{field}` is not a finite number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
}

/// Decode one telemetry line (without its terminator).
///
/// Returns `Ok(None)` for lines with any other tag, so newer controller
/// firmware can add report types without breaking older clients.  Fields
/// past the third are ignored.
///
/// # Errors
///
/// Returns [`ProtocolError`] when the line is tagged `POS` but its fields are
/// missing or not numeric.
pub fn parse_line(line: &str) -> Result<Option<Pose>, ProtocolError> {
    let mut fields = line.split_whitespace();
    if fields.next() != Some(POSITION_TAG) {
        return Ok(None);
    }

    let values: Vec<&str> = fields.take(3).collect();
    if values.len() < 3 {
        return Err(ProtocolError::MissingField {
            found: values.len(),
        });
    }

    let pan = parse_number("pan", values[0])?;
    let tilt = parse_number("tilt", values[1])?;
    // The laser indicator is sent as a number and truncated toward zero.
    let laser = parse_number("laser", values[2])?.trunc();

    Ok(Some(Pose::new(pan, tilt, laser != 0.0)))
}

fn parse_number(field: &'static str, raw: &str) -> Result<f64, ProtocolError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ProtocolError::InvalidNumber {
            field,
            value: raw.to_string(),
        })
}

// ────────────────────────────────────────────────────────────────────────────
// Framing
// ────────────────────────────────────────────────────────────────────────────

/// Reassembles `\n`-terminated lines from arbitrarily split byte chunks.
///
/// A partial line longer than [`MAX_LINE_LEN`] is dropped, together with
/// the rest of it up to the next terminator.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
    /// Bytes at the front of `buffer` already known to hold no `\n`.
    scanned: usize,
    discarding: bool,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and return every line completed by them, trimmed of
    /// surrounding whitespace (including a `\r` before the `\n`).
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
            let end = self.scanned + offset;
            let raw: Vec<u8> = self.buffer.drain(..=end).collect();
            self.scanned = 0;
            if std::mem::take(&mut self.discarding) {
                continue;
            }
            let text = String::from_utf8_lossy(&raw[..end]);
            lines.push(text.trim().to_string());
        }
        self.scanned = self.buffer.len();

        if self.buffer.len() > MAX_LINE_LEN {
            debug!(
                len = self.buffer.len(),
                "dropping oversized partial telemetry line"
            );
            self.buffer.clear();
            self.scanned = 0;
            self.discarding = true;
        }
        lines
    }

    /// Number of buffered bytes still waiting for a terminator.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Shared state
// ────────────────────────────────────────────────────────────────────────────

/// Pose snapshot shared between the background reader and any caller of
/// `read_telemetry`.
///
/// All three pose fields are replaced together under one lock, so a reader
/// never observes a half-applied report.
#[derive(Debug)]
pub struct TelemetryState {
    pose: Mutex<Pose>,
    running: AtomicBool,
}

impl Default for TelemetryState {
    fn default() -> Self {
        Self {
            pose: Mutex::new(Pose::default()),
            running: AtomicBool::new(true),
        }
    }
}

impl TelemetryState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Return a copy of the most recent pose.  Never blocks on I/O.
    pub fn snapshot(&self) -> Pose {
        *self.pose.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Overwrite the stored pose.
    pub fn update(&self, pose: Pose) {
        *self.pose.lock().unwrap_or_else(PoisonError::into_inner) = pose;
    }

    /// `true` while the background reader is alive.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn mark_stopped(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// TelemetryChannel
// ────────────────────────────────────────────────────────────────────────────

/// The single logical reader of a controller connection.
pub struct TelemetryChannel {
    decoder: LineDecoder,
    state: Arc<TelemetryState>,
}

impl TelemetryChannel {
    pub fn new(state: Arc<TelemetryState>) -> Self {
        Self {
            decoder: LineDecoder::new(),
            state,
        }
    }

    /// Feed raw bytes into the channel.
    ///
    /// Returns the number of position reports applied to the shared state.
    pub fn ingest(&mut self, bytes: &[u8]) -> usize {
        let mut applied = 0;
        for line in self.decoder.push(bytes) {
            match parse_line(&line) {
                Ok(Some(pose)) => {
                    trace!(pan = pose.pan, tilt = pose.tilt, emitter = pose.emitter_on, "POS");
                    self.state.update(pose);
                    applied += 1;
                }
                Ok(None) => {}
                Err(e) => debug!(error = %e, line = %line, "discarding malformed telemetry line"),
            }
        }
        applied
    }

    /// Read from `reader` until end-of-stream or an I/O error.
    ///
    /// The shared state is marked as no longer running when the loop ends.
    /// There is no reconnect; that decision belongs to the session owner.
    pub async fn run<R>(mut self, mut reader: R)
    where
        R: AsyncRead + Unpin,
    {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => {
                    info!("controller closed the telemetry stream");
                    break;
                }
                Ok(n) => {
                    self.ingest(&chunk[..n]);
                }
                Err(e) => {
                    warn!(error = %e, "telemetry read failed");
                    break;
                }
            }
        }
        self.state.mark_stopped();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (Arc<TelemetryState>, TelemetryChannel) {
        let state = TelemetryState::new();
        let channel = TelemetryChannel::new(Arc::clone(&state));
        (state, channel)
    }

    #[test]
    fn full_line_updates_pose() {
        let (state, mut channel) = channel();
        assert_eq!(channel.ingest(b"POS 1.000 2.000 1\n"), 1);
        assert_eq!(state.snapshot(), Pose::new(1.0, 2.0, true));
    }

    #[test]
    fn line_split_across_reads_is_reassembled() {
        let (state, mut channel) = channel();
        assert_eq!(channel.ingest(b"PO"), 0);
        assert_eq!(state.snapshot(), Pose::default());
        assert_eq!(channel.ingest(b"S 1.0 2.0 0\n"), 1);
        assert_eq!(state.snapshot(), Pose::new(1.0, 2.0, false));
    }

    #[test]
    fn garbage_line_leaves_pose_unchanged() {
        let (state, mut channel) = channel();
        channel.ingest(b"POS 5 6 1\n");
        assert_eq!(channel.ingest(b"GARBAGE\n"), 0);
        assert_eq!(state.snapshot(), Pose::new(5.0, 6.0, true));
    }

    #[test]
    fn malformed_pos_line_is_discarded() {
        let (state, mut channel) = channel();
        channel.ingest(b"POS 5 6 1\n");
        assert_eq!(channel.ingest(b"POS 7 eight 1\nPOS 9\n"), 0);
        assert_eq!(state.snapshot(), Pose::new(5.0, 6.0, true));
    }

    #[test]
    fn several_lines_in_one_chunk_keep_the_last() {
        let (state, mut channel) = channel();
        assert_eq!(channel.ingest(b"POS 1 1 0\nSTATUS ok\nPOS 3 4 1\nPOS 9"), 2);
        assert_eq!(state.snapshot(), Pose::new(3.0, 4.0, true));
        assert_eq!(channel.decoder.pending(), 5);
    }

    #[test]
    fn parse_line_truncates_laser_field() {
        assert_eq!(parse_line("POS 0 0 0.9").unwrap(), Some(Pose::new(0.0, 0.0, false)));
        assert_eq!(parse_line("POS 0 0 1.7").unwrap(), Some(Pose::new(0.0, 0.0, true)));
    }

    #[test]
    fn parse_line_ignores_other_tags_and_prefixes() {
        assert_eq!(parse_line("ACK SET").unwrap(), None);
        assert_eq!(parse_line("POSX 1 2 3").unwrap(), None);
        assert_eq!(parse_line("").unwrap(), None);
    }

    #[test]
    fn parse_line_ignores_extra_fields() {
        assert_eq!(
            parse_line("POS -12.5 3.25 1 extra 42").unwrap(),
            Some(Pose::new(-12.5, 3.25, true))
        );
    }

    #[test]
    fn parse_line_rejects_short_and_non_finite_reports() {
        assert_eq!(
            parse_line("POS 1 2").unwrap_err(),
            ProtocolError::MissingField { found: 2 }
        );
        assert!(matches!(
            parse_line("POS NaN 2 0").unwrap_err(),
            ProtocolError::InvalidNumber { field: "pan", .. }
        ));
    }

    #[test]
    fn decoder_handles_crlf() {
        let mut decoder = LineDecoder::new();
        assert_eq!(decoder.push(b"POS 1 2 0\r\n"), vec!["POS 1 2 0".to_string()]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn decoder_drops_oversized_partial_line() {
        let mut decoder = LineDecoder::new();
        let junk = vec![b'x'; MAX_LINE_LEN / 2 + 1];
        assert!(decoder.push(&junk).is_empty());
        assert!(decoder.push(&junk).is_empty());
        assert_eq!(decoder.pending(), 0);

        // The tail of the dropped line is discarded; the next line survives.
        assert_eq!(
            decoder.push(b"POS 9 9 1\nPOS 1 2 0\n"),
            vec!["POS 1 2 0".to_string()]
        );
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn decoder_reassembles_line_fed_byte_by_byte() {
        let mut decoder = LineDecoder::new();
        let mut lines = Vec::new();
        for byte in b"POS 3 4 1\n" {
            lines.extend(decoder.push(std::slice::from_ref(byte)));
        }
        assert_eq!(lines, vec!["POS 3 4 1".to_string()]);
    }

    #[tokio::test]
    async fn run_marks_state_stopped_at_end_of_stream() {
        let (state, channel) = channel();
        let reader: &[u8] = b"POS 10 20 1\nPOS 11 21 0\n";
        channel.run(reader).await;
        assert!(!state.is_running());
        assert_eq!(state.snapshot(), Pose::new(11.0, 21.0, false));
    }
}
