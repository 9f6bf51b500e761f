use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Last-known or commanded state of the pan/tilt head.
///
/// Angles are plain degrees; range clamping is the controller's job.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub pan: f64,
    pub tilt: f64,
    pub emitter_on: bool,
}

impl Pose {
    pub fn new(pan: f64, tilt: f64, emitter_on: bool) -> Self {
        Self {
            pan,
            tilt,
            emitter_on,
        }
    }
}

/// A single scan target produced by the raster generator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub pan: f64,
    pub tilt: f64,
}

impl Waypoint {
    pub fn new(pan: f64, tilt: f64) -> Self {
        Self { pan, tilt }
    }
}

/// A bounding box reported by the detector, in pixels.
///
/// `x`/`y` are the box centre, `w`/`h` its size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// Outcome of one search-and-lock run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockResult {
    /// `true` when a target was detected and the emitter sequence completed.
    pub found: bool,
    /// Number of detector polls issued, including polls that errored.
    pub polls: u64,
    /// Number of full raster passes completed without a hit.
    pub cycles_completed: u32,
    /// The corrected pose commanded on lock, if any.
    pub aim: Option<Pose>,
}

impl LockResult {
    pub fn not_found(polls: u64, cycles_completed: u32) -> Self {
        Self {
            found: false,
            polls,
            cycles_completed,
            aim: None,
        }
    }
}

/// Errors that make continuing a search meaningless.
///
/// Per-sample anomalies (a bad telemetry line, a detector timeout) never
/// surface as an `AimError`; they degrade to "no signal" where they occur.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AimError {
    #[error("Connection Error ({addr}): {details}")]
    Connection { addr: String, details: String },

    #[error("Write Error: {0}")]
    Write(String),

    #[error("Invalid Configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Detector Unreachable after {consecutive_failures} consecutive failed polls")]
    DetectorUnreachable { consecutive_failures: u32 },

    #[error("Search aborted by operator")]
    Aborted,
}
