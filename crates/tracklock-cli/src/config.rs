//! Configuration vault – reads/writes `~/.tracklock/config.toml`.
//!
//! Every section is optional; missing keys fall back to the reference rig's
//! values.  The library crates never read this file: the CLI turns it into
//! explicit [`ScanPattern`], [`SearchConfig`], and [`ProcessDetector`] values.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracklock_perception::{CameraModel, ProcessDetector};
use tracklock_runtime::{AxisRange, ScanPattern, SearchConfig};
use tracklock_types::AimError;

/// Where the motion controller listens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout_secs: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9000,
            connect_timeout_secs: 5.0,
        }
    }
}

/// Raster bounds, density and pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub pan_min: f64,
    pub pan_max: f64,
    pub tilt_min: f64,
    pub tilt_max: f64,
    pub steps: usize,
    pub dwell_secs: f64,
    pub max_cycles: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            pan_min: -60.0,
            pan_max: 60.0,
            tilt_min: -30.0,
            tilt_max: 30.0,
            steps: 6,
            dwell_secs: 0.6,
            max_cycles: 6,
        }
    }
}

/// What happens once a target is seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    pub hold_secs: f64,
    /// Consecutive detector errors that abort the run; `0` disables.
    pub detector_failure_limit: u32,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            hold_secs: 1.0,
            detector_failure_limit: 0,
        }
    }
}

/// Assumed camera geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub frame_width: f64,
    pub frame_height: f64,
    pub horizontal_fov_deg: f64,
    pub vertical_fov_deg: f64,
    pub invert_tilt: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        let model = CameraModel::default();
        Self {
            frame_width: model.frame_width,
            frame_height: model.frame_height,
            horizontal_fov_deg: model.horizontal_fov_deg,
            vertical_fov_deg: model.vertical_fov_deg,
            invert_tilt: model.invert_tilt,
        }
    }
}

/// How to invoke the external detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub interpreter: String,
    pub script: String,
    pub args: Vec<String>,
    pub timeout_secs: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            script: "../python/detect_tf.py".to_string(),
            args: vec!["--single".to_string()],
            timeout_secs: 2.5,
        }
    }
}

/// Persisted configuration stored in `~/.tracklock/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub controller: ControllerConfig,
    pub scan: ScanConfig,
    pub lock: LockConfig,
    pub camera: CameraConfig,
    pub detector: DetectorConfig,
}

impl Config {
    /// Check every value before anything touches the network.
    ///
    /// # Errors
    ///
    /// Returns [`AimError::InvalidConfiguration`] describing the first bad value.
    pub fn validate(&self) -> Result<(), AimError> {
        self.scan_pattern()?;
        tracklock_runtime::SearchController::new(self.search_config()?)?;
        self.detector()?;
        Ok(())
    }

    pub fn scan_pattern(&self) -> Result<ScanPattern, AimError> {
        ScanPattern::new(
            AxisRange::new(self.scan.pan_min, self.scan.pan_max),
            AxisRange::new(self.scan.tilt_min, self.scan.tilt_max),
            self.scan.steps,
            seconds("scan.dwell_secs", self.scan.dwell_secs)?,
        )
    }

    pub fn search_config(&self) -> Result<SearchConfig, AimError> {
        let camera = CameraModel::new(
            self.camera.frame_width,
            self.camera.frame_height,
            self.camera.horizontal_fov_deg,
            self.camera.vertical_fov_deg,
        )?
        .with_invert_tilt(self.camera.invert_tilt);

        Ok(SearchConfig {
            max_cycles: self.scan.max_cycles,
            hold: seconds("lock.hold_secs", self.lock.hold_secs)?,
            camera,
            detector_failure_limit: Some(self.lock.detector_failure_limit).filter(|&n| n > 0),
        })
    }

    pub fn detector(&self) -> Result<ProcessDetector, AimError> {
        let timeout = seconds("detector.timeout_secs", self.detector.timeout_secs)?;
        if timeout.is_zero() {
            return Err(AimError::InvalidConfiguration(
                "detector.timeout_secs must be greater than zero".to_string(),
            ));
        }
        let args = std::iter::once(self.detector.script.clone()).chain(self.detector.args.iter().cloned());
        Ok(ProcessDetector::new(self.detector.interpreter.clone(), args).with_timeout(timeout))
    }

    pub fn connect_timeout(&self) -> Result<Duration, AimError> {
        seconds("controller.connect_timeout_secs", self.controller.connect_timeout_secs)
    }
}

fn seconds(field: &str, value: f64) -> Result<Duration, AimError> {
    Duration::try_from_secs_f64(value).map_err(|_| {
        AimError::InvalidConfiguration(format!("{field} must be a non-negative number of seconds, got {value}"))
    })
}

/// Return the path to `~/.tracklock/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".tracklock").join("config.toml")
}

/// Load the config from `path`, or defaults when the file does not exist.
/// `TRACKLOCK_*` environment overrides are applied in both cases.
pub fn load_from(path: &Path) -> Result<Config, String> {
    let mut cfg = if path.exists() {
        let raw = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?
    } else {
        Config::default()
    };
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Apply `TRACKLOCK_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `TRACKLOCK_HOST` | `controller.host` |
/// | `TRACKLOCK_PORT` | `controller.port` |
/// | `TRACKLOCK_DETECTOR` | `detector.script` |
/// | `TRACKLOCK_MAX_CYCLES` | `scan.max_cycles` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("TRACKLOCK_HOST") {
        cfg.controller.host = v;
    }
    if let Ok(v) = std::env::var("TRACKLOCK_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.controller.port = port;
    }
    if let Ok(v) = std::env::var("TRACKLOCK_DETECTOR") {
        cfg.detector.script = v;
    }
    if let Ok(v) = std::env::var("TRACKLOCK_MAX_CYCLES")
        && let Ok(cycles) = v.parse::<u32>()
    {
        cfg.scan.max_cycles = cycles;
    }
}

/// Write `cfg` to `path`, creating the parent directory if needed.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}
