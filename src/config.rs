// Loop timing, topics, and drivetrain tuning
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::swerve::{PidGains, WheelbaseGeometry};

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Nominal tick period derived from LOOP_HZ
pub const LOOP_PERIOD: Duration = Duration::from_millis(1000 / LOOP_HZ);

// Intent watchdog: teleop falls back to the zero intent after this long
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Zenoh topics
pub const TOPIC_CMD_INTENT: &str = "swerve/cmd/intent"; // teleop motion intent
pub const TOPIC_CMD_MODE: &str = "swerve/cmd/mode"; // robot mode changes
pub const TOPIC_CMD_SEGMENT: &str = "swerve/cmd/segment"; // autonomous segments
pub const TOPIC_RT_WHEELS: &str = "swerve/rt/wheels"; // per-wheel power commands
pub const TOPIC_TELEMETRY: &str = "swerve/state/telemetry"; // diagnostics
pub const TOPIC_HEALTH: &str = "swerve/state/health"; // health status

/// Errors raised while loading or validating the tuning file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("power_factor must be in (0, 1], got {0}")]
    PowerFactor(f64),

    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("{field} output limit must be in (0, 1], got {value}")]
    OutputLimit { field: &'static str, value: f64 },
}

/// One closed loop: gains, symmetric output clamp, on-target band
///
/// A section present in the file must be complete; missing sections take
/// the defaults for that loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoopConfig {
    pub gains: PidGains,
    pub output_limit: f64,
    pub tolerance: f64,
}

impl LoopConfig {
    /// Steering loop defaults: degrees in, full power out
    pub fn azimuth() -> Self {
        Self {
            gains: PidGains::new(0.01, 0.001, 0.01, 0.0),
            output_limit: 1.0,
            tolerance: 3.0,
        }
    }

    /// Drive loop defaults: limited to a quarter of full power
    pub fn drive() -> Self {
        Self {
            gains: PidGains::new(0.001, 0.0, 0.0, 0.0),
            output_limit: 0.25,
            tolerance: 5.0,
        }
    }

    fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        if !(self.output_limit > 0.0 && self.output_limit <= 1.0) {
            return Err(ConfigError::OutputLimit {
                field,
                value: self.output_limit,
            });
        }
        if !(self.tolerance >= 0.0) {
            return Err(ConfigError::Negative {
                field,
                value: self.tolerance,
            });
        }
        Ok(())
    }
}

/// Quadrature counter scaling and stop detection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Inches travelled per counted pulse
    pub distance_per_pulse: f64,
    /// Below this rate (in/s) the wheel counts as stopped
    pub min_rate: f64,
    /// How long the rate has to stay below `min_rate`
    pub stop_debounce_ms: u64,
}

impl EncoderConfig {
    pub fn stop_debounce(&self) -> Duration {
        Duration::from_millis(self.stop_debounce_ms)
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            distance_per_pulse: 0.094153,
            min_rate: 0.2,
            stop_debounce_ms: 100,
        }
    }
}

/// Full tuning tree, read once at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub geometry: WheelbaseGeometry,
    /// Global cap on commanded teleop wheel speed
    pub power_factor: f64,
    pub azimuth: LoopConfig,
    pub drive: LoopConfig,
    pub encoder: EncoderConfig,
    /// Per-wheel drive polarity, [FL, FR, RL, RR]
    pub inverted: [bool; 4],
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            geometry: WheelbaseGeometry::default(),
            power_factor: 0.75,
            azimuth: LoopConfig::azimuth(),
            drive: LoopConfig::drive(),
            encoder: EncoderConfig::default(),
            inverted: [false; 4],
        }
    }
}

impl DriveConfig {
    /// Load from a JSON file, or fall back to defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_json(&text)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reject tuning values the control loops cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.power_factor > 0.0 && self.power_factor <= 1.0) {
            return Err(ConfigError::PowerFactor(self.power_factor));
        }

        let positives = [
            ("geometry.length", self.geometry.length),
            ("geometry.width", self.geometry.width),
            ("geometry.turn_radius_inches", self.geometry.turn_radius_inches),
            ("encoder.distance_per_pulse", self.encoder.distance_per_pulse),
        ];
        for (field, value) in positives {
            if !(value > 0.0) {
                return Err(ConfigError::NonPositive { field, value });
            }
        }

        if !(self.encoder.min_rate >= 0.0) {
            return Err(ConfigError::Negative {
                field: "encoder.min_rate",
                value: self.encoder.min_rate,
            });
        }
        if self.encoder.stop_debounce_ms == 0 {
            return Err(ConfigError::NonPositive {
                field: "encoder.stop_debounce_ms",
                value: 0.0,
            });
        }

        self.azimuth.validate("azimuth")?;
        self.drive.validate("drive")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = DriveConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.power_factor, 0.75);
        assert_eq!(config.drive.output_limit, 0.25);
        assert_eq!(config.azimuth.tolerance, 3.0);
        assert_eq!(config.geometry.turn_radius_inches, 32.5);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = DriveConfig::from_json(
            r#"{
                "power_factor": 0.5,
                "drive": {"gains": {"kp": 0.002}, "output_limit": 0.65, "tolerance": 4.0}
            }"#,
        )
        .unwrap();
        assert_eq!(config.power_factor, 0.5);
        assert_eq!(config.drive.output_limit, 0.65);
        assert_eq!(config.drive.gains.kp, 0.002);
        assert_eq!(config.drive.gains.ki, 0.0);
        assert_eq!(config.azimuth, LoopConfig::azimuth());
        assert_eq!(config.encoder, EncoderConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn incomplete_loop_section_is_rejected() {
        let err = DriveConfig::from_json(r#"{"drive": {"output_limit": 0.65}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_power_factor_above_one() {
        let config = DriveConfig {
            power_factor: 1.5,
            ..DriveConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::PowerFactor(_))));
    }

    #[test]
    fn rejects_zero_wheelbase() {
        let mut config = DriveConfig::default();
        config.geometry.width = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositive {
                field: "geometry.width",
                ..
            })
        ));
    }

    #[test]
    fn rejects_output_limit_over_full_range() {
        let mut config = DriveConfig::default();
        config.drive.output_limit = 1.2;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutputLimit { field: "drive", .. })
        ));
    }

    #[test]
    fn rejects_nan_tolerance() {
        let mut config = DriveConfig::default();
        config.azimuth.tolerance = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = DriveConfig::load(Some(Path::new("/nonexistent/swerve.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn no_path_loads_defaults() {
        assert_eq!(DriveConfig::load(None).unwrap(), DriveConfig::default());
    }
}
