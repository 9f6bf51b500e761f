//! [`DetectorHealth`] – consecutive-failure tracker for detector polls.
//!
//! A poll that errors (timeout, launch failure, garbage output) counts the
//! same as "no detection" for that waypoint.  That is the right call for a
//! flaky model but hides a detector that can never run at all, e.g. a wrong
//! script path.  The tracker counts *consecutive* errors; any well-formed
//! answer, positive or negative, clears the streak.  With a limit set, the
//! streak reaching it becomes fatal.
//!
//! # Example
//!
//! ```rust
//! use tracklock_runtime::health::DetectorHealth;
//!
//! let mut health = DetectorHealth::new(Some(2));
//! assert!(health.record_failure().is_ok());
//! health.record_success();
//! assert!(health.record_failure().is_ok());
//! assert!(health.record_failure().is_err()); // second in a row
//! ```

use tracklock_types::AimError;

#[derive(Debug, Clone, Default)]
pub struct DetectorHealth {
    /// Consecutive failures that become fatal; `None` never escalates.
    limit: Option<u32>,
    consecutive: u32,
    total: u64,
}

impl DetectorHealth {
    /// A limit of `Some(0)` is treated as "no limit".
    pub fn new(limit: Option<u32>) -> Self {
        Self {
            limit: limit.filter(|&n| n > 0),
            ..Self::default()
        }
    }

    /// The detector produced a well-formed answer.
    pub fn record_success(&mut self) {
        self.consecutive = 0;
    }

    /// The detector failed to produce an answer.
    ///
    /// # Errors
    ///
    /// Returns [`AimError::DetectorUnreachable`] once the streak of failures
    /// reaches the configured limit.
    pub fn record_failure(&mut self) -> Result<(), AimError> {
        self.consecutive += 1;
        self.total += 1;
        match self.limit {
            Some(limit) if self.consecutive >= limit => Err(AimError::DetectorUnreachable {
                consecutive_failures: self.consecutive,
            }),
            _ => Ok(()),
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive
    }

    pub fn total_failures(&self) -> u64 {
        self.total
    }
}
