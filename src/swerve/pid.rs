// Discrete PID loop for the wheel actuators
//
// One sample per control tick. Gains are per-sample (no dt scaling), the
// integrator is clamped so its contribution stays inside the output range,
// and error/on-target are always evaluated against the latest measurement,
// even while the loop is disabled.

use serde::{Deserialize, Serialize};

/// Proportional, integral, derivative and feed-forward gains
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub kf: f64,
}

impl PidGains {
    pub const fn new(kp: f64, ki: f64, kd: f64, kf: f64) -> Self {
        Self { kp, ki, kd, kf }
    }
}

#[derive(Debug, Clone)]
pub struct PidController {
    gains: PidGains,
    output_min: f64,
    output_max: f64,
    tolerance: f64,
    /// Input wraps around over [0, range) when set
    continuous_range: Option<f64>,
    /// Add `kf * setpoint` to the output
    setpoint_feed_forward: bool,

    setpoint: f64,
    measurement: f64,
    total_error: f64,
    prev_error: f64,
    output: f64,
    enabled: bool,
}

impl PidController {
    /// New disabled loop with a symmetric output clamp of `±output_limit`
    pub fn new(gains: PidGains, output_limit: f64, tolerance: f64) -> Self {
        Self {
            gains,
            output_min: -output_limit.abs(),
            output_max: output_limit.abs(),
            tolerance,
            continuous_range: None,
            setpoint_feed_forward: false,
            setpoint: 0.0,
            measurement: 0.0,
            total_error: 0.0,
            prev_error: 0.0,
            output: 0.0,
            enabled: false,
        }
    }

    /// Treat the input as circular over [0, range)
    pub fn continuous(mut self, range: f64) -> Self {
        self.continuous_range = Some(range);
        self
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
    }

    pub fn set_setpoint_feed_forward(&mut self, on: bool) {
        self.setpoint_feed_forward = on;
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    pub fn set_setpoint(&mut self, setpoint: f64) {
        self.setpoint = match self.continuous_range {
            Some(range) => setpoint.rem_euclid(range),
            None => setpoint,
        };
    }

    pub fn measurement(&self) -> f64 {
        self.measurement
    }

    pub fn set_measurement(&mut self, measurement: f64) {
        self.measurement = measurement;
    }

    /// Setpoint minus measurement, shortest way round for continuous inputs
    pub fn error(&self) -> f64 {
        let error = self.setpoint - self.measurement;
        match self.continuous_range {
            Some(range) => wrap_error(error, range),
            None => error,
        }
    }

    pub fn on_target(&self) -> bool {
        self.error().abs() < self.tolerance
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
        self.output = 0.0;
    }

    /// Clear integrator and derivative history, keep enabled state
    pub fn clear_history(&mut self) {
        self.total_error = 0.0;
        self.prev_error = 0.0;
        self.output = 0.0;
    }

    /// Clear history and disable
    pub fn reset(&mut self) {
        self.clear_history();
        self.disable();
    }

    /// Move the setpoint onto the current measurement
    pub fn freeze_setpoint(&mut self) {
        self.set_setpoint(self.setpoint - self.error());
    }

    /// Last value produced by `calculate`
    pub fn output(&self) -> f64 {
        self.output
    }

    /// Run one sample; a disabled loop outputs 0
    pub fn calculate(&mut self) -> f64 {
        if !self.enabled {
            self.output = 0.0;
            return 0.0;
        }

        let error = self.error();
        let PidGains { kp, ki, kd, kf } = self.gains;

        if ki != 0.0 {
            let potential = (self.total_error + error) * ki;
            if potential >= self.output_max {
                self.total_error = self.output_max / ki;
            } else if potential <= self.output_min {
                self.total_error = self.output_min / ki;
            } else {
                self.total_error += error;
            }
        }

        let feed_forward = if self.setpoint_feed_forward {
            kf * self.setpoint
        } else {
            0.0
        };

        let raw = kp * error + ki * self.total_error + kd * (error - self.prev_error) + feed_forward;
        self.prev_error = error;
        self.output = raw.clamp(self.output_min, self.output_max);
        self.output
    }
}

/// Fold an error into (-range/2, range/2]
pub fn wrap_error(error: f64, range: f64) -> f64 {
    let half = range / 2.0;
    let wrapped = (error + half).rem_euclid(range) - half;
    if wrapped == -half { half } else { wrapped }
}
