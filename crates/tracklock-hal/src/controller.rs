//! Generic `PointingController` trait for pan/tilt heads with an emitter.
//!
//! The search runtime only ever talks to this trait, so the TCP session and
//! the in-process simulator are interchangeable.

use async_trait::async_trait;
use tracklock_types::{AimError, Pose};

/// A two-axis pointing head with an on/off emitter.
#[async_trait]
pub trait PointingController: Send + Sync {
    /// Command the head to `pan`/`tilt` degrees with the emitter on or off.
    ///
    /// Returns once the command has been handed to the controller; it does
    /// not wait for the motion to complete.
    ///
    /// # Errors
    ///
    /// Returns [`AimError::Write`] if the command cannot be delivered.
    async fn set_pose(&self, pan: f64, tilt: f64, emitter_on: bool) -> Result<(), AimError>;

    /// Return the most recently reported pose without blocking on I/O.
    fn telemetry(&self) -> Pose;

    /// `false` once the link to the controller is known to be gone.
    fn is_alive(&self) -> bool;

    /// Where the controller lives, for error reports.
    fn endpoint(&self) -> &str;
}
