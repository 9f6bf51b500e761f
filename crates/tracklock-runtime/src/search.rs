//! [`SearchController`] – scan, detect, correct, fire.
//!
//! The controller walks a [`ScanPattern`] one waypoint at a time.  At each
//! waypoint it:
//!
//! 1. commands the waypoint with the emitter **off**,
//! 2. waits the pattern's dwell,
//! 3. polls the [`Detector`] exactly once.
//!
//! The first detection ends the scan: the pixel offset is turned into an
//! angular correction by the [`CameraModel`], the corrected pose is commanded
//! with the emitter **on**, held, and then re-commanded with the emitter off.
//!
//! ```text
//! Scanning ──(nothing)──▶ Scanning (next waypoint / next pass)
//! Scanning ──(hit)──────▶ Correcting ─▶ Holding ─▶ Locked
//! Scanning ──(passes exhausted)──────────────────▶ NotFound
//! ```
//!
//! # Failure policy
//!
//! * A detector error counts as "nothing" for that waypoint and is logged.
//!   When a failure limit is configured, that many consecutive errors abort
//!   with [`AimError::DetectorUnreachable`].
//! * Any controller write error aborts immediately; a head that cannot be
//!   commanded cannot be searched with.
//! * The controller link is checked before every waypoint.  A dead link ends
//!   the search with [`AimError::Connection`].
//! * The optional abort flag is checked before every waypoint.  When raised,
//!   the emitter is commanded off at the last commanded waypoint (nothing is
//!   sent if no waypoint was commanded yet) and the search returns
//!   [`AimError::Aborted`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, info_span, warn, Instrument};
use tracklock_hal::PointingController;
use tracklock_perception::{CameraModel, Detector};
use tracklock_types::{AimError, Detection, LockResult, Pose, Waypoint};

use crate::health::DetectorHealth;
use crate::scan::ScanPattern;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for [`SearchController`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// Full raster passes to attempt before giving up.
    pub max_cycles: u32,
    /// How long the emitter stays on at the corrected pose.
    pub hold: Duration,
    /// Geometry used to turn pixel offsets into degrees.
    pub camera: CameraModel,
    /// Consecutive detector errors that abort the search; `None` never does.
    pub detector_failure_limit: Option<u32>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_cycles: 3,
            hold: Duration::from_secs(1),
            camera: CameraModel::default(),
            detector_failure_limit: None,
        }
    }
}

/// Where the state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Idle,
    Scanning,
    Correcting,
    Holding,
    Locked,
    NotFound,
}

// ─────────────────────────────────────────────────────────────────────────────
// SearchController
// ─────────────────────────────────────────────────────────────────────────────

/// Drives one search-and-lock run at a time.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use tracklock_hal::ControllerSession;
/// use tracklock_perception::ProcessDetector;
/// use tracklock_runtime::scan::{AxisRange, ScanPattern};
/// use tracklock_runtime::search::{SearchConfig, SearchController};
///
/// # async fn demo() -> Result<(), tracklock_types::AimError> {
/// let pattern = ScanPattern::new(
///     AxisRange::new(-60.0, 60.0),
///     AxisRange::new(-30.0, 30.0),
///     6,
///     Duration::from_millis(600),
/// )?;
/// let controller = SearchController::new(SearchConfig::default())?;
/// let session = ControllerSession::connect("127.0.0.1", 9000).await?;
/// let detector = ProcessDetector::new("python3", ["detect_tf.py", "--single"]);
///
/// let result = controller.search(&session, &pattern, &detector).await;
/// session.close().await;
/// println!("found: {}", result?.found);
/// # Ok(())
/// # }
/// ```
pub struct SearchController {
    config: SearchConfig,
    abort: Option<Arc<AtomicBool>>,
    phase: watch::Sender<SearchPhase>,
}

impl SearchController {
    /// Validate `config` and build a controller.
    ///
    /// # Errors
    ///
    /// Returns [`AimError::InvalidConfiguration`] for `max_cycles == 0` or a
    /// degenerate camera model.
    pub fn new(config: SearchConfig) -> Result<Self, AimError> {
        if config.max_cycles == 0 {
            return Err(AimError::InvalidConfiguration(
                "max_cycles must be at least 1".to_string(),
            ));
        }
        config.camera.validate()?;
        let (phase, _) = watch::channel(SearchPhase::Idle);
        Ok(Self {
            config,
            abort: None,
            phase,
        })
    }

    /// Attach a shared abort flag (builder-style).
    pub fn with_abort_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.abort = Some(flag);
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Observe phase transitions as they happen.
    pub fn subscribe(&self) -> watch::Receiver<SearchPhase> {
        self.phase.subscribe()
    }

    /// The most recently entered phase.
    pub fn phase(&self) -> SearchPhase {
        *self.phase.borrow()
    }

    /// Run the search to a definite outcome.
    ///
    /// Returns `found: true` after the first detection has been aimed at and
    /// fired on, `found: false` after `max_cycles` passes without a hit.
    ///
    /// # Errors
    ///
    /// Returns [`AimError::Write`] if the controller rejects a command,
    /// [`AimError::Connection`] if the controller link drops,
    /// [`AimError::DetectorUnreachable`] when the failure limit is hit, and
    /// [`AimError::Aborted`] when the abort flag is raised.
    pub async fn search<C, D>(
        &self,
        controller: &C,
        pattern: &ScanPattern,
        detector: &D,
    ) -> Result<LockResult, AimError>
    where
        C: PointingController + ?Sized,
        D: Detector + ?Sized,
    {
        let span = info_span!(
            "search",
            steps = pattern.steps_per_axis(),
            max_cycles = self.config.max_cycles
        );
        self.run(controller, pattern, detector).instrument(span).await
    }

    async fn run<C, D>(
        &self,
        controller: &C,
        pattern: &ScanPattern,
        detector: &D,
    ) -> Result<LockResult, AimError>
    where
        C: PointingController + ?Sized,
        D: Detector + ?Sized,
    {
        let mut health = DetectorHealth::new(self.config.detector_failure_limit);
        let mut polls: u64 = 0;
        let mut last_commanded: Option<Waypoint> = None;

        for cycle in 0..self.config.max_cycles {
            info!(cycle = cycle + 1, "starting scan pass");
            self.enter(SearchPhase::Scanning);

            for waypoint in pattern.generate() {
                self.check_abort(controller, last_commanded).await?;
                check_link(controller)?;

                controller.set_pose(waypoint.pan, waypoint.tilt, false).await?;
                last_commanded = Some(waypoint);
                pause(pattern.dwell()).await;

                polls += 1;
                let detection = match detector.poll().await {
                    Ok(detection) => {
                        health.record_success();
                        detection
                    }
                    Err(e) => {
                        warn!(
                            error = %e,
                            pan = waypoint.pan,
                            tilt = waypoint.tilt,
                            "detector poll failed; treating as no detection"
                        );
                        health.record_failure()?;
                        None
                    }
                };

                match detection {
                    Some(detection) => {
                        return self
                            .lock_on(controller, waypoint, &detection, polls, cycle)
                            .await;
                    }
                    None => debug!(pan = waypoint.pan, tilt = waypoint.tilt, "no target"),
                }
            }
        }

        info!(polls, "target not found");
        self.enter(SearchPhase::NotFound);
        Ok(LockResult::not_found(polls, self.config.max_cycles))
    }

    async fn lock_on<C>(
        &self,
        controller: &C,
        waypoint: Waypoint,
        detection: &Detection,
        polls: u64,
        cycles_completed: u32,
    ) -> Result<LockResult, AimError>
    where
        C: PointingController + ?Sized,
    {
        self.enter(SearchPhase::Correcting);
        let aim = self.config.camera.aim(waypoint, detection);
        info!(
            x = detection.x,
            y = detection.y,
            w = detection.w,
            h = detection.h,
            pan = aim.pan,
            tilt = aim.tilt,
            "target detected; aiming"
        );

        controller.set_pose(aim.pan, aim.tilt, true).await?;
        self.enter(SearchPhase::Holding);
        pause(self.config.hold).await;
        controller.set_pose(aim.pan, aim.tilt, false).await?;

        self.enter(SearchPhase::Locked);
        Ok(LockResult {
            found: true,
            polls,
            cycles_completed,
            aim: Some(Pose::new(aim.pan, aim.tilt, true)),
        })
    }

    async fn check_abort<C>(
        &self,
        controller: &C,
        last_commanded: Option<Waypoint>,
    ) -> Result<(), AimError>
    where
        C: PointingController + ?Sized,
    {
        let raised = self
            .abort
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst));
        if !raised {
            return Ok(());
        }
        warn!("abort requested; switching emitter off");
        if let Some(at) = last_commanded {
            controller.set_pose(at.pan, at.tilt, false).await?;
        }
        Err(AimError::Aborted)
    }

    fn enter(&self, phase: SearchPhase) {
        let previous = self.phase.send_replace(phase);
        if previous != phase {
            debug!(?previous, ?phase, "search phase");
        }
    }
}

fn check_link<C>(controller: &C) -> Result<(), AimError>
where
    C: PointingController + ?Sized,
{
    if controller.is_alive() {
        return Ok(());
    }
    warn!(addr = controller.endpoint(), "controller link lost");
    Err(AimError::Connection {
        addr: controller.endpoint().to_string(),
        details: "telemetry stream closed".to_string(),
    })
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
