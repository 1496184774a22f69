// Hardware seam for one swerve module
//
// The control core never talks to device drivers directly. Whatever sits
// behind this trait (motor controllers on a bus, a simulator) supplies the
// absolute steering angle and the drive quadrature counter, and accepts the
// two power commands.

use std::time::Duration;

pub trait WheelHardware {
    /// Called once per tick before any sensor is read
    fn poll(&mut self, _dt: Duration) {}

    /// Absolute steering angle in degrees, [0, 360)
    fn azimuth_degrees(&mut self) -> f64;

    /// Raw drive encoder count since power-up
    fn encoder_count(&mut self) -> i64;

    /// Drive encoder rate in pulses per second
    fn encoder_rate(&mut self) -> f64;

    /// Drive motor power in [-1, 1]
    fn set_drive_power(&mut self, power: f64);

    /// Steering motor power in [-1, 1]
    fn set_turn_power(&mut self, power: f64);
}

/// Steering speed at full turn power
pub const SIM_TURN_DEG_PER_SEC: f64 = 720.0;

/// Wheel surface speed at full drive power
pub const SIM_DRIVE_INCHES_PER_SEC: f64 = 120.0;

/// Kinematic stand-in for a module: power integrates straight into
/// angle and distance, no inertia.
#[derive(Debug, Clone)]
pub struct SimulatedWheel {
    distance_per_pulse: f64,
    angle: f64,
    pulses: f64,
    rate_pps: f64,
    drive_power: f64,
    turn_power: f64,
    azimuth_jammed: bool,
    encoder_stuck: bool,
}

impl SimulatedWheel {
    pub fn new(distance_per_pulse: f64) -> Self {
        Self {
            distance_per_pulse,
            angle: 0.0,
            pulses: 0.0,
            rate_pps: 0.0,
            drive_power: 0.0,
            turn_power: 0.0,
            azimuth_jammed: false,
            encoder_stuck: false,
        }
    }

    /// Start the module at a given steering angle
    pub fn with_angle(mut self, degrees: f64) -> Self {
        self.angle = degrees.rem_euclid(360.0);
        self
    }

    /// Ignore turn power so the angle cannot change
    pub fn jam_azimuth(&mut self, jammed: bool) {
        self.azimuth_jammed = jammed;
    }

    /// Freeze the drive counter while the wheel keeps turning
    pub fn stick_encoder(&mut self, stuck: bool) {
        self.encoder_stuck = stuck;
    }

    pub fn drive_power(&self) -> f64 {
        self.drive_power
    }

    pub fn turn_power(&self) -> f64 {
        self.turn_power
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Distance rolled in inches, regardless of encoder faults
    pub fn travelled(&self) -> f64 {
        self.pulses * self.distance_per_pulse
    }
}

impl WheelHardware for SimulatedWheel {
    fn poll(&mut self, dt: Duration) {
        let secs = dt.as_secs_f64();

        if !self.azimuth_jammed {
            self.angle = (self.angle + self.turn_power * SIM_TURN_DEG_PER_SEC * secs).rem_euclid(360.0);
        }

        self.rate_pps = self.drive_power * SIM_DRIVE_INCHES_PER_SEC / self.distance_per_pulse;
        self.pulses += self.rate_pps * secs;
    }

    fn azimuth_degrees(&mut self) -> f64 {
        self.angle
    }

    fn encoder_count(&mut self) -> i64 {
        if self.encoder_stuck {
            return 0;
        }
        self.pulses.trunc() as i64
    }

    fn encoder_rate(&mut self) -> f64 {
        if self.encoder_stuck {
            return 0.0;
        }
        self.rate_pps
    }

    fn set_drive_power(&mut self, power: f64) {
        self.drive_power = power.clamp(-1.0, 1.0);
    }

    fn set_turn_power(&mut self, power: f64) {
        self.turn_power = power.clamp(-1.0, 1.0);
    }
}
