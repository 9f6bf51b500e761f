//! `tracklock-runtime` – Search-and-Lock Engine
//!
//! The control loop that finds a target and puts the emitter on it.
//!
//! # Modules
//!
//! - [`scan`] – [`ScanPattern`][scan::ScanPattern]: a pure serpentine raster
//!   over a pan/tilt rectangle, one fresh [`Raster`][scan::Raster] iterator
//!   per pass.
//! - [`search`] – [`SearchController`][search::SearchController]: drives a
//!   [`PointingController`][tracklock_hal::PointingController] through the
//!   raster, polls a [`Detector`][tracklock_perception::Detector] at each
//!   waypoint, and fires on the first hit.
//! - [`health`] – [`DetectorHealth`][health::DetectorHealth]: turns a streak
//!   of detector errors into a fatal error when a limit is configured.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console
//!   logging plus optional OTLP span export.

pub mod health;
pub mod scan;
pub mod search;
pub mod telemetry;

pub use health::DetectorHealth;
pub use scan::{AxisRange, Raster, ScanPattern, ScanState};
pub use search::{SearchConfig, SearchController, SearchPhase};
pub use telemetry::{TracerProviderGuard, init_tracing};
