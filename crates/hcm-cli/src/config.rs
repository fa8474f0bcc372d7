//! Configuration – reads/writes `~/.hcm/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hcm_kernel::BlackboardConfig;
use hcm_runtime::DEFAULT_MAX_HOPS;
use hcm_types::HcmError;
use serde::{Deserialize, Serialize};

/// Persisted HCM configuration stored in `~/.hcm/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Control loop frequency.
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: u32,

    /// IMU samples older than this are a hardware problem.
    #[serde(default = "default_timeout_secs")]
    pub imu_timeout_secs: f64,

    /// Motor state messages older than this mean the motors are unavailable.
    #[serde(default = "default_timeout_secs")]
    pub motor_timeout_secs: f64,

    /// Switch the motors off after this long without a motion goal.
    #[serde(default = "default_motor_off_time_secs")]
    pub motor_off_time_secs: f64,

    #[serde(default)]
    pub simulation_active: bool,

    #[serde(default = "default_true")]
    pub stand_up_active: bool,

    #[serde(default = "default_true")]
    pub falling_detection_active: bool,

    /// Decisions allowed per tick before the tree counts as malformed.
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,
}

fn default_tick_rate_hz() -> u32 {
    100
}
fn default_timeout_secs() -> f64 {
    0.5
}
fn default_motor_off_time_secs() -> f64 {
    86_400.0
}
fn default_true() -> bool {
    true
}
fn default_max_hops() -> usize {
    DEFAULT_MAX_HOPS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_rate_hz: default_tick_rate_hz(),
            imu_timeout_secs: default_timeout_secs(),
            motor_timeout_secs: default_timeout_secs(),
            motor_off_time_secs: default_motor_off_time_secs(),
            simulation_active: false,
            stand_up_active: true,
            falling_detection_active: true,
            max_hops: default_max_hops(),
        }
    }
}

impl Config {
    /// Reject values the control loop cannot run with.
    pub fn validate(&self) -> Result<(), HcmError> {
        if self.tick_rate_hz == 0 {
            return Err(HcmError::Config("tick_rate_hz must be positive".to_string()));
        }
        if self.tick_period().is_zero() {
            return Err(HcmError::Config(format!(
                "tick_rate_hz {} is too high: the tick period rounds to zero",
                self.tick_rate_hz
            )));
        }
        if self.max_hops == 0 {
            return Err(HcmError::Config("max_hops must be positive".to_string()));
        }
        self.to_blackboard_config().map(|_| ())
    }

    pub fn to_blackboard_config(&self) -> Result<BlackboardConfig, HcmError> {
        Ok(BlackboardConfig {
            imu_timeout: positive_secs("imu_timeout_secs", self.imu_timeout_secs)?,
            motor_timeout: positive_secs("motor_timeout_secs", self.motor_timeout_secs)?,
            motor_off_time: positive_secs("motor_off_time_secs", self.motor_off_time_secs)?,
            simulation_active: self.simulation_active,
            stand_up_active: self.stand_up_active,
            falling_detection_active: self.falling_detection_active,
        })
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(1) / self.tick_rate_hz.max(1)
    }
}

fn positive_secs(field: &str, secs: f64) -> Result<Duration, HcmError> {
    if secs <= 0.0 {
        return Err(HcmError::Config(format!("{field} must be positive, got {secs}")));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| HcmError::Config(format!("{field} is not a valid duration: {e}")))
}

/// Return the path to `~/.hcm/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".hcm").join("config.toml")
}

/// Load the config, writing a default file on first run.  Environment
/// overrides are applied and the result validated.
pub fn load_or_init() -> Result<(Config, bool), HcmError> {
    let (mut cfg, created) = load_or_init_at(&config_path())?;
    apply_env_overrides(&mut cfg)?;
    cfg.validate()?;
    Ok((cfg, created))
}

pub(crate) fn load_or_init_at(path: &Path) -> Result<(Config, bool), HcmError> {
    match load_from(path)? {
        Some(cfg) => Ok((cfg, false)),
        None => {
            let cfg = Config::default();
            save_to(&cfg, path)?;
            Ok((cfg, true))
        }
    }
}

/// Load the config file as written.  Returns `None` if it does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, HcmError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| HcmError::Config(format!("Failed to read config at {}: {}", path.display(), e)))?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| HcmError::Config(format!("Failed to parse config: {}", e)))?;
    Ok(Some(cfg))
}

/// Apply `HCM_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `HCM_TICK_RATE_HZ` | `tick_rate_hz` |
/// | `HCM_MOTOR_OFF_TIME` | `motor_off_time_secs` |
/// | `HCM_IMU_TIMEOUT` | `imu_timeout_secs` |
/// | `HCM_SIMULATION` | `simulation_active` (`true`/`false`/`1`/`0`) |
pub fn apply_env_overrides(cfg: &mut Config) -> Result<(), HcmError> {
    if let Ok(v) = std::env::var("HCM_TICK_RATE_HZ") {
        cfg.tick_rate_hz = parse_env("HCM_TICK_RATE_HZ", &v)?;
    }
    if let Ok(v) = std::env::var("HCM_MOTOR_OFF_TIME") {
        cfg.motor_off_time_secs = parse_env("HCM_MOTOR_OFF_TIME", &v)?;
    }
    if let Ok(v) = std::env::var("HCM_IMU_TIMEOUT") {
        cfg.imu_timeout_secs = parse_env("HCM_IMU_TIMEOUT", &v)?;
    }
    if let Ok(v) = std::env::var("HCM_SIMULATION") {
        cfg.simulation_active = match v.trim() {
            "1" => true,
            "0" => false,
            other => parse_env("HCM_SIMULATION", other)?,
        };
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, HcmError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| HcmError::Config(format!("{name}={value:?}: {e}")))
}

/// Save the config, creating `~/.hcm/` if necessary.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), HcmError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| HcmError::Config(format!("Failed to create config directory: {}", e)))?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| HcmError::Config(format!("Failed to serialize config: {}", e)))?;
    fs::write(path, raw)
        .map_err(|e| HcmError::Config(format!("Failed to write config at {}: {}", path.display(), e)))
}
