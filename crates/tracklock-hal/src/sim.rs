//! In-process simulated controller for headless runs and tests.
//!
//! [`SimController`] records every command it receives and echoes it back
//! as telemetry immediately, the way a perfectly responsive controller
//! would.  It can also be told to start failing after a number of commands
//! so callers can exercise their fatal-write paths, or be disconnected to
//! look like a controller whose telemetry stream has gone away.
//!
//! # Example
//!
//! ```rust
//! use tracklock_hal::{PointingController, SimController};
//!
//! # tokio_test_block_on(async {
//! let sim = SimController::new();
//! sim.set_pose(12.0, -4.0, true).await.unwrap();
//! assert_eq!(sim.telemetry().pan, 12.0);
//! assert_eq!(sim.commands().len(), 1);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tracklock_types::{AimError, Pose};

use crate::controller::PointingController;

/// A simulated pan/tilt head.  Always succeeds unless a failure point is set.
#[derive(Debug, Default)]
pub struct SimController {
    pose: Mutex<Pose>,
    commands: Mutex<Vec<Pose>>,
    fail_after: Option<usize>,
    disconnected: AtomicBool,
}

const SIM_ENDPOINT: &str = "sim";

impl SimController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `count` commands, then reject every later one with
    /// [`AimError::Write`].
    pub fn failing_after(count: usize) -> Self {
        Self {
            fail_after: Some(count),
            ..Self::default()
        }
    }

    /// Mark the link as lost.  Commands are still recorded, but
    /// [`is_alive`][PointingController::is_alive] reports `false`.
    pub fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }

    /// Every accepted command, in order.
    pub fn commands(&self) -> Vec<Pose> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl PointingController for SimController {
    async fn set_pose(&self, pan: f64, tilt: f64, emitter_on: bool) -> Result<(), AimError> {
        let mut commands = self.commands.lock().unwrap_or_else(PoisonError::into_inner);
        if self.fail_after.is_some_and(|limit| commands.len() >= limit) {
            return Err(AimError::Write("simulated controller link failure".to_string()));
        }
        let pose = Pose::new(pan, tilt, emitter_on);
        commands.push(pose);
        *self.pose.lock().unwrap_or_else(PoisonError::into_inner) = pose;
        Ok(())
    }

    fn telemetry(&self) -> Pose {
        *self.pose.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_alive(&self) -> bool {
        !self.disconnected.load(Ordering::SeqCst)
    }

    fn endpoint(&self) -> &str {
        SIM_ENDPOINT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sim_records_and_echoes_commands() {
        let sim = SimController::new();
        assert_eq!(sim.telemetry(), Pose::default());

        sim.set_pose(1.0, 2.0, false).await.unwrap();
        sim.set_pose(3.0, 4.0, true).await.unwrap();

        assert_eq!(sim.telemetry(), Pose::new(3.0, 4.0, true));
        assert_eq!(
            sim.commands(),
            vec![Pose::new(1.0, 2.0, false), Pose::new(3.0, 4.0, true)]
        );
    }

    #[tokio::test]
    async fn sim_fails_after_configured_count() {
        let sim = SimController::failing_after(1);
        sim.set_pose(1.0, 1.0, false).await.unwrap();
        let err = sim.set_pose(2.0, 2.0, false).await.unwrap_err();
        assert!(matches!(err, AimError::Write(_)));
        assert_eq!(sim.commands().len(), 1);
        assert_eq!(sim.telemetry(), Pose::new(1.0, 1.0, false));
    }

    #[test]
    fn disconnect_marks_link_dead() {
        let sim = SimController::new();
        assert!(sim.is_alive());
        sim.disconnect();
        assert!(!sim.is_alive());
        assert_eq!(sim.endpoint(), "sim");
    }
}
