//! The `Detector` capability and its process-backed implementation.
//!
//! A detector is polled once per scan waypoint and answers either "nothing
//! in frame" or a pixel-space bounding box.  Failures are reported as
//! [`DetectorError`] so callers can tell a well-formed negative from an
//! unreachable model; the search runtime decides what each one means.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, instrument};
use tracklock_types::Detection;

/// Upper bound on a single detector invocation.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(2500);

/// Literal the detector prints when nothing was found.
pub const NO_DETECTION: &str = "NONE";

/// Why a single poll produced no usable answer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectorError {
    #[error("detector did not answer within {0:?}")]
    Timeout(Duration),

    #[error("detector could not be started: {0}")]
    Spawn(String),

    #[error("detector exited unsuccessfully (status {0:?})")]
    Exit(Option<i32>),

    #[error("detector output could not be parsed: {0}")]
    Parse(String),
}

/// A source of target detections.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Run one detection.
    ///
    /// `Ok(None)` means the detector ran and saw nothing.
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError`] on timeout, launch failure, or malformed
    /// output.  Implementations must bound their own running time.
    async fn poll(&self) -> Result<Option<Detection>, DetectorError>;
}

/// Interpret the detector's standard output.
///
/// Accepts the literal [`NO_DETECTION`] or a JSON object with numeric
/// `x`, `y`, `w`, `h` fields.  Extra fields such as a confidence score are
/// ignored.
///
/// # Errors
///
/// Returns [`DetectorError::Parse`] for anything else.
pub fn parse_output(stdout: &str) -> Result<Option<Detection>, DetectorError> {
    let out = stdout.trim();
    if out == NO_DETECTION {
        return Ok(None);
    }
    if !out.starts_with('{') {
        return Err(DetectorError::Parse(format!("unexpected output {out:?}")));
    }
    serde_json::from_str::<Detection>(out)
        .map(Some)
        .map_err(|e| DetectorError::Parse(e.to_string()))
}

// ────────────────────────────────────────────────────────────────────────────
// ProcessDetector
// ────────────────────────────────────────────────────────────────────────────

/// Runs an external program per poll and parses what it prints.
///
/// The child is killed if it outlives the timeout.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use tracklock_perception::detector::ProcessDetector;
///
/// let detector = ProcessDetector::new("python3", ["detect_tf.py", "--single"])
///     .with_timeout(Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct ProcessDetector {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ProcessDetector {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    /// Override the per-poll timeout (builder-style).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Detector for ProcessDetector {
    #[instrument(level = "debug", skip(self), fields(program = %self.program))]
    async fn poll(&self) -> Result<Option<Detection>, DetectorError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| DetectorError::Timeout(self.timeout))?
            .map_err(|e| DetectorError::Spawn(format!("{}: {e}", self.program)))?;

        if !output.status.success() {
            debug!(
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "detector failed"
            );
            return Err(DetectorError::Exit(output.status.code()));
        }

        parse_output(&String::from_utf8_lossy(&output.stdout))
    }
}
