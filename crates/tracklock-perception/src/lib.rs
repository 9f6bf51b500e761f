//! `tracklock-perception` – Target Detection
//!
//! # Modules
//!
//! - [`detector`] – the [`Detector`][detector::Detector] capability, polled
//!   once per scan waypoint, and
//!   [`ProcessDetector`][detector::ProcessDetector], which shells out to an
//!   external model with a bounded timeout.
//! - [`camera`] – [`CameraModel`][camera::CameraModel]: maps a pixel-space
//!   detection to a pan/tilt correction under an assumed field of view.

pub mod camera;
pub mod detector;

pub use camera::{AngularCorrection, CameraModel};
pub use detector::{Detector, DetectorError, ProcessDetector, parse_output};
