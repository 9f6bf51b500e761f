//! Pixel-space to angular-space mapping.
//!
//! A detection's offset from the frame centre is normalised to `[-1, 1]` on
//! each axis and scaled by half the assumed field of view:
//!
//! ```text
//! dx = (x - W/2) / (W/2)        pan  = dx * HFOV/2
//! dy = (y - H/2) / (H/2)        tilt = ∓dy * VFOV/2
//! ```
//!
//! Image rows grow downward, and on the reference rig a row further down
//! means the head must tilt up, so the tilt term is negated by default.
//! Rigs with the camera mounted the other way set `invert_tilt = false`.
//! Detections outside the frame are not an error; they extrapolate.
//!
//! # Example
//!
//! ```rust
//! use tracklock_perception::camera::CameraModel;
//! use tracklock_types::Detection;
//!
//! let camera = CameraModel::default(); // 320×240, 60°×45°
//! let c = camera.correction(&Detection { x: 320.0, y: 0.0, w: 8.0, h: 8.0 });
//! assert!((c.pan - 30.0).abs() < 1e-9);
//! assert!((c.tilt - 22.5).abs() < 1e-9);
//! ```

use serde::{Deserialize, Serialize};
use tracklock_types::{AimError, Detection, Waypoint};

/// Assumed camera geometry used to turn pixel offsets into degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraModel {
    /// Frame width in pixels.
    pub frame_width: f64,
    /// Frame height in pixels.
    pub frame_height: f64,
    /// Horizontal field of view in degrees.
    pub horizontal_fov_deg: f64,
    /// Vertical field of view in degrees.
    pub vertical_fov_deg: f64,
    /// Negate the tilt correction (image-down maps to tilt-up).
    pub invert_tilt: bool,
}

impl Default for CameraModel {
    fn default() -> Self {
        Self {
            frame_width: 320.0,
            frame_height: 240.0,
            horizontal_fov_deg: 60.0,
            vertical_fov_deg: 45.0,
            invert_tilt: true,
        }
    }
}

/// Pan/tilt offset in degrees to apply on top of the current waypoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngularCorrection {
    pub pan: f64,
    pub tilt: f64,
}

impl CameraModel {
    /// Build a model, rejecting non-positive or non-finite dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`AimError::InvalidConfiguration`] for a degenerate frame or
    /// field of view.
    pub fn new(
        frame_width: f64,
        frame_height: f64,
        horizontal_fov_deg: f64,
        vertical_fov_deg: f64,
    ) -> Result<Self, AimError> {
        let model = Self {
            frame_width,
            frame_height,
            horizontal_fov_deg,
            vertical_fov_deg,
            invert_tilt: true,
        };
        model.validate()?;
        Ok(model)
    }

    /// Builder-style override of the tilt sign convention.
    pub fn with_invert_tilt(mut self, invert_tilt: bool) -> Self {
        self.invert_tilt = invert_tilt;
        self
    }

    /// Check that every dimension is finite and strictly positive.
    ///
    /// # Errors
    ///
    /// Returns [`AimError::InvalidConfiguration`] naming the first bad field.
    pub fn validate(&self) -> Result<(), AimError> {
        let fields = [
            ("frame_width", self.frame_width),
            ("frame_height", self.frame_height),
            ("horizontal_fov_deg", self.horizontal_fov_deg),
            ("vertical_fov_deg", self.vertical_fov_deg),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value <= 0.0 {
                return Err(AimError::InvalidConfiguration(format!(
                    "camera {name} must be a positive number, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Offset of the detection centre from the frame centre, normalised so
    /// the frame edges sit at ±1.
    pub fn normalized_offset(&self, detection: &Detection) -> (f64, f64) {
        let cx = self.frame_width / 2.0;
        let cy = self.frame_height / 2.0;
        ((detection.x - cx) / cx, (detection.y - cy) / cy)
    }

    /// Angular correction that would centre `detection` in the frame.
    pub fn correction(&self, detection: &Detection) -> AngularCorrection {
        let (dx, dy) = self.normalized_offset(detection);
        let tilt_sign = if self.invert_tilt { -1.0 } else { 1.0 };
        AngularCorrection {
            pan: dx * (self.horizontal_fov_deg / 2.0),
            tilt: tilt_sign * dy * (self.vertical_fov_deg / 2.0),
        }
    }

    /// Absolute aim point: `from` plus the correction for `detection`.
    pub fn aim(&self, from: Waypoint, detection: &Detection) -> Waypoint {
        let c = self.correction(detection);
        Waypoint::new(from.pan + c.pan, from.tilt + c.tilt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn det(x: f64, y: f64) -> Detection {
        Detection { x, y, w: 10.0, h: 10.0 }
    }

    #[test]
    fn centred_detection_needs_no_correction() {
        let c = CameraModel::default().correction(&det(160.0, 120.0));
        assert!(c.pan.abs() < EPS);
        assert!(c.tilt.abs() < EPS);
    }

    #[test]
    fn top_right_corner_maps_to_half_fov() {
        let c = CameraModel::default().correction(&det(320.0, 0.0));
        assert!((c.pan - 30.0).abs() < EPS);
        assert!((c.tilt - 22.5).abs() < EPS);
    }

    #[test]
    fn bottom_left_corner_maps_to_negative_half_fov() {
        let c = CameraModel::default().correction(&det(0.0, 240.0));
        assert!((c.pan + 30.0).abs() < EPS);
        assert!((c.tilt + 22.5).abs() < EPS);
    }

    #[test]
    fn tilt_sign_is_configurable() {
        let camera = CameraModel::default().with_invert_tilt(false);
        let c = camera.correction(&det(320.0, 0.0));
        assert!((c.tilt + 22.5).abs() < EPS);
    }

    #[test]
    fn out_of_frame_detection_extrapolates() {
        let camera = CameraModel::default();
        let (dx, dy) = camera.normalized_offset(&det(480.0, -120.0));
        assert!((dx - 2.0).abs() < EPS);
        assert!((dy + 2.0).abs() < EPS);
        let c = camera.correction(&det(480.0, -120.0));
        assert!((c.pan - 60.0).abs() < EPS);
        assert!((c.tilt - 45.0).abs() < EPS);
    }

    #[test]
    fn aim_adds_correction_to_waypoint() {
        let target = CameraModel::default().aim(Waypoint::new(-36.0, 6.0), &det(240.0, 60.0));
        assert!((target.pan - (-36.0 + 15.0)).abs() < EPS);
        assert!((target.tilt - (6.0 + 11.25)).abs() < EPS);
    }

    #[test]
    fn degenerate_geometry_is_rejected() {
        assert!(CameraModel::new(320.0, 240.0, 60.0, 45.0).is_ok());
        assert!(matches!(
            CameraModel::new(0.0, 240.0, 60.0, 45.0),
            Err(AimError::InvalidConfiguration(_))
        ));
        assert!(CameraModel::new(320.0, 240.0, f64::NAN, 45.0).is_err());
        assert!(CameraModel::new(320.0, 240.0, 60.0, -1.0).is_err());
    }
}
