//! `tracklock-hal` – Motion Controller Link
//!
//! Everything that talks to the pan/tilt motion controller.
//!
//! # Modules
//!
//! - [`telemetry`] – [`TelemetryChannel`][telemetry::TelemetryChannel]:
//!   reassembles the controller's `POS` line stream and keeps the latest
//!   [`Pose`][tracklock_types::Pose] in a lock-guarded
//!   [`TelemetryState`][telemetry::TelemetryState].
//! - [`command`] – [`CommandChannel`][command::CommandChannel]: encodes `SET`
//!   lines and serialises concurrent writers.
//! - [`session`] – [`ControllerSession`][session::ControllerSession]: one TCP
//!   connection composing both channels, with a background reader task.
//! - [`controller`] – [`PointingController`][controller::PointingController]:
//!   the trait the search runtime drives.
//! - [`sim`] – [`SimController`][sim::SimController]: an in-process stand-in
//!   for CI and dry runs.

pub mod command;
pub mod controller;
pub mod session;
pub mod sim;
pub mod telemetry;

pub use command::{CommandChannel, encode_set};
pub use controller::PointingController;
pub use session::{ControllerSession, DEFAULT_CONNECT_TIMEOUT};
pub use sim::SimController;
pub use telemetry::{ProtocolError, TelemetryChannel, TelemetryState};
