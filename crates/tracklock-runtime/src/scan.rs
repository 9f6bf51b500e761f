//! Boustrophedon (serpentine) raster over a pan/tilt rectangle.
//!
//! Tilt rows are visited in ascending order.  Even rows sweep pan upward,
//! odd rows sweep it back down, so the head never makes a full-width return
//! between rows:
//!
//! ```text
//! row 0:  p0 → p1 → p2
//! row 1:  p2 ← p1 ← p0
//! row 2:  p0 → p1 → p2
//! ```
//!
//! The generator is pure.  Dwell is only carried as a value; commanding each
//! waypoint and waiting is the caller's business.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use tracklock_runtime::scan::{AxisRange, ScanPattern};
//!
//! let pattern = ScanPattern::new(
//!     AxisRange::new(-60.0, 60.0),
//!     AxisRange::new(-30.0, 30.0),
//!     3,
//!     Duration::from_millis(600),
//! )
//! .unwrap();
//!
//! let pans: Vec<f64> = pattern.generate().map(|w| w.pan).collect();
//! assert_eq!(pans, vec![-60.0, 0.0, 60.0, 60.0, 0.0, -60.0, -60.0, 0.0, 60.0]);
//! ```

use std::iter::FusedIterator;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracklock_types::{AimError, Waypoint};

/// Upper bound on steps per axis; a pass is at most this value squared.
pub const MAX_STEPS_PER_AXIS: usize = 1000;

/// Closed interval of angles, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
}

impl AxisRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// `steps` evenly spaced values from `min` to `max`, both included.
    fn spaced(&self, steps: usize) -> Vec<f64> {
        let span = self.max - self.min;
        let last = (steps - 1) as f64;
        (0..steps)
            .map(|i| self.min + i as f64 * span / last)
            .collect()
    }
}

/// Sweep direction of a raster row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    fn for_row(row: usize) -> Self {
        if row % 2 == 0 {
            Direction::Forward
        } else {
            Direction::Reverse
        }
    }
}

/// Validated raster parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPattern {
    pan: AxisRange,
    tilt: AxisRange,
    steps: usize,
    dwell: Duration,
}

impl ScanPattern {
    /// Validate and build a pattern.
    ///
    /// # Errors
    ///
    /// Returns [`AimError::InvalidConfiguration`] when `steps_per_axis < 2`
    /// (a single step leaves nothing to space values over), when it exceeds
    /// [`MAX_STEPS_PER_AXIS`], or when either range is non-finite or not
    /// strictly increasing.
    pub fn new(
        pan: AxisRange,
        tilt: AxisRange,
        steps_per_axis: usize,
        dwell: Duration,
    ) -> Result<Self, AimError> {
        if steps_per_axis < 2 {
            return Err(AimError::InvalidConfiguration(format!(
                "scan needs at least 2 steps per axis, got {steps_per_axis}"
            )));
        }
        let per_pass = steps_per_axis.checked_mul(steps_per_axis);
        if steps_per_axis > MAX_STEPS_PER_AXIS || per_pass.is_none() {
            return Err(AimError::InvalidConfiguration(format!(
                "scan allows at most {MAX_STEPS_PER_AXIS} steps per axis, got {steps_per_axis}"
            )));
        }
        for (axis, range) in [("pan", pan), ("tilt", tilt)] {
            if !range.min.is_finite() || !range.max.is_finite() || range.min >= range.max {
                return Err(AimError::InvalidConfiguration(format!(
                    "{axis} range must satisfy min < max, got [{}, {}]",
                    range.min, range.max
                )));
            }
        }
        Ok(Self {
            pan,
            tilt,
            steps: steps_per_axis,
            dwell,
        })
    }

    /// Start a fresh, independent pass over the raster.
    pub fn generate(&self) -> Raster {
        Raster {
            pans: self.pan.spaced(self.steps),
            tilts: self.tilt.spaced(self.steps),
            state: ScanState::default(),
        }
    }

    /// Waypoints per pass (`steps²`).
    pub fn len(&self) -> usize {
        self.steps * self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn steps_per_axis(&self) -> usize {
        self.steps
    }

    /// How long the caller should hold each waypoint before polling.
    pub fn dwell(&self) -> Duration {
        self.dwell
    }
}

/// Validate parameters and return the first pass in one call.
///
/// # Errors
///
/// See [`ScanPattern::new`].
pub fn generate(
    pan: AxisRange,
    tilt: AxisRange,
    steps_per_axis: usize,
    dwell: Duration,
) -> Result<Raster, AimError> {
    ScanPattern::new(pan, tilt, steps_per_axis, dwell).map(|p| p.generate())
}

/// Position of a [`Raster`] within its pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanState {
    pub row: usize,
    pub column: usize,
}

impl ScanState {
    pub fn direction(&self) -> Direction {
        Direction::for_row(self.row)
    }
}

/// Lazy iterator over one pass of a [`ScanPattern`].
#[derive(Debug, Clone)]
pub struct Raster {
    pans: Vec<f64>,
    tilts: Vec<f64>,
    state: ScanState,
}

impl Raster {
    pub fn state(&self) -> ScanState {
        self.state
    }

    fn remaining(&self) -> usize {
        let steps = self.pans.len();
        let done = self.state.row * steps + self.state.column;
        (self.tilts.len() * steps).saturating_sub(done)
    }
}

impl Iterator for Raster {
    type Item = Waypoint;

    fn next(&mut self) -> Option<Waypoint> {
        let steps = self.pans.len();
        let tilt = *self.tilts.get(self.state.row)?;
        let index = match self.state.direction() {
            Direction::Forward => self.state.column,
            Direction::Reverse => steps - 1 - self.state.column,
        };
        let waypoint = Waypoint::new(self.pans[index], tilt);

        self.state.column += 1;
        if self.state.column == steps {
            self.state.column = 0;
            self.state.row += 1;
        }
        Some(waypoint)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

impl ExactSizeIterator for Raster {}

impl FusedIterator for Raster {}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(steps: usize) -> ScanPattern {
        ScanPattern::new(
            AxisRange::new(-60.0, 60.0),
            AxisRange::new(-30.0, 30.0),
            steps,
            Duration::from_millis(600),
        )
        .unwrap()
    }

    #[test]
    fn yields_steps_squared_waypoints() {
        for steps in 2..=9 {
            let p = pattern(steps);
            assert_eq!(p.generate().count(), steps * steps);
            assert_eq!(p.generate().len(), steps * steps);
            assert_eq!(p.len(), steps * steps);
        }
    }

    #[test]
    fn fewer_than_two_steps_is_invalid() {
        for steps in [0, 1] {
            let err = ScanPattern::new(
                AxisRange::new(-60.0, 60.0),
                AxisRange::new(-30.0, 30.0),
                steps,
                Duration::ZERO,
            )
            .unwrap_err();
            assert!(matches!(err, AimError::InvalidConfiguration(_)));
        }
    }

    #[test]
    fn absurd_step_counts_are_invalid() {
        for steps in [MAX_STEPS_PER_AXIS + 1, usize::MAX / 2, usize::MAX] {
            let err = ScanPattern::new(
                AxisRange::new(-60.0, 60.0),
                AxisRange::new(-30.0, 30.0),
                steps,
                Duration::ZERO,
            )
            .unwrap_err();
            assert!(matches!(err, AimError::InvalidConfiguration(_)));
        }

        let widest = ScanPattern::new(
            AxisRange::new(-60.0, 60.0),
            AxisRange::new(-30.0, 30.0),
            MAX_STEPS_PER_AXIS,
            Duration::ZERO,
        )
        .unwrap();
        assert_eq!(widest.len(), MAX_STEPS_PER_AXIS * MAX_STEPS_PER_AXIS);
    }

    #[test]
    fn degenerate_ranges_are_invalid() {
        let bad = [
            (AxisRange::new(10.0, -10.0), AxisRange::new(-30.0, 30.0)),
            (AxisRange::new(-60.0, 60.0), AxisRange::new(5.0, 5.0)),
            (AxisRange::new(f64::NEG_INFINITY, 60.0), AxisRange::new(-30.0, 30.0)),
        ];
        for (pan, tilt) in bad {
            assert!(ScanPattern::new(pan, tilt, 4, Duration::ZERO).is_err());
        }
    }

    #[test]
    fn rows_alternate_direction_over_ascending_tilt() {
        let steps = 6;
        let waypoints: Vec<Waypoint> = pattern(steps).generate().collect();
        let rows: Vec<&[Waypoint]> = waypoints.chunks(steps).collect();
        assert_eq!(rows.len(), steps);

        for (r, row) in rows.iter().enumerate() {
            assert!(row.iter().all(|w| w.tilt == row[0].tilt), "row {r} mixes tilts");
            for pair in row.windows(2) {
                if r % 2 == 0 {
                    assert!(pair[1].pan > pair[0].pan, "row {r} should ascend");
                } else {
                    assert!(pair[1].pan < pair[0].pan, "row {r} should descend");
                }
            }
        }
        for pair in rows.windows(2) {
            assert!(pair[1][0].tilt > pair[0][0].tilt);
        }
    }

    #[test]
    fn endpoints_are_included() {
        let waypoints: Vec<Waypoint> = pattern(6).generate().collect();
        let first = waypoints.first().unwrap();
        let last = waypoints.last().unwrap();
        assert_eq!((first.pan, first.tilt), (-60.0, -30.0));
        // Six rows: the last one runs in reverse and ends at pan_min.
        assert_eq!((last.pan, last.tilt), (-60.0, 30.0));
    }

    #[test]
    fn each_generate_starts_a_fresh_pass() {
        let p = pattern(3);
        let mut first = p.generate();
        first.next();
        first.next();
        assert_eq!(first.state(), ScanState { row: 0, column: 2 });
        assert_eq!(first.len(), 7);

        let second = p.generate();
        assert_eq!(second.state(), ScanState::default());
        assert_eq!(second.len(), 9);
    }

    #[test]
    fn state_tracks_row_direction() {
        let mut raster = pattern(2).generate();
        assert_eq!(raster.state().direction(), Direction::Forward);
        raster.next();
        raster.next();
        assert_eq!(raster.state(), ScanState { row: 1, column: 0 });
        assert_eq!(raster.state().direction(), Direction::Reverse);
        raster.next();
        raster.next();
        assert_eq!(raster.next(), None);
        assert_eq!(raster.next(), None);
    }

    #[test]
    fn free_generate_validates_first() {
        assert!(generate(AxisRange::new(0.0, 1.0), AxisRange::new(0.0, 1.0), 1, Duration::ZERO).is_err());
        let raster = generate(AxisRange::new(0.0, 1.0), AxisRange::new(0.0, 1.0), 2, Duration::ZERO).unwrap();
        assert_eq!(
            raster.collect::<Vec<_>>(),
            vec![
                Waypoint::new(0.0, 0.0),
                Waypoint::new(1.0, 0.0),
                Waypoint::new(1.0, 1.0),
                Waypoint::new(0.0, 1.0),
            ]
        );
    }

    #[test]
    fn dwell_is_carried_not_applied() {
        assert_eq!(pattern(3).dwell(), Duration::from_millis(600));
    }
}
