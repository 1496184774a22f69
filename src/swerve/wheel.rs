// One swerve module: steering loop + drive loop over a WheelHardware
//
// Each control tick runs sense(dt) -> a command (drive / drive_to_setpoint /
// stop) -> actuate(). The steering loop is continuous over 0-360°. The drive
// loop runs either on distance (autonomous) or on rate (teleop).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::hardware::WheelHardware;
use super::kinematics::WheelIndex;
use super::pid::{PidController, PidGains};
use crate::config::DriveConfig;

/// What the drive loop setpoint means
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveMode {
    /// Setpoint is a distance in inches
    Position,
    /// Setpoint is a speed
    Rate,
}

/// Power commands issued on the last actuate()
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WheelOutput {
    pub drive: f64,
    pub turn: f64,
}

/// Debounced "wheel is not rolling" detector
#[derive(Debug, Clone)]
pub struct StopDetector {
    min_rate: f64,
    debounce: Duration,
    below_for: Duration,
}

impl StopDetector {
    pub fn new(min_rate: f64, debounce: Duration) -> Self {
        Self {
            min_rate,
            debounce,
            below_for: Duration::ZERO,
        }
    }

    pub fn update(&mut self, rate: f64, dt: Duration) {
        if rate.abs() < self.min_rate {
            self.below_for = self.below_for.saturating_add(dt);
        } else {
            self.below_for = Duration::ZERO;
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.below_for >= self.debounce
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SelfTest {
    Begin,
    DriveTest { until: Duration },
    TurnTest { until: Duration },
    End,
}

const SELF_TEST_PHASE: Duration = Duration::from_secs(3);

pub struct WheelActuator<H> {
    index: WheelIndex,
    hardware: H,
    azimuth: PidController,
    drive: PidController,
    drive_mode: DriveMode,
    /// Teleop power, written straight through while the drive loop is off
    open_loop_drive: f64,
    /// Last distance handed to set_distance_setpoint
    distance_setpoint: f64,
    inverted: bool,
    distance_per_pulse: f64,
    count_offset: i64,
    angle: f64,
    distance: f64,
    rate: f64,
    stop_detector: StopDetector,
    output: WheelOutput,
    self_test: Option<SelfTest>,
}

impl<H: WheelHardware> WheelActuator<H> {
    pub fn new(index: WheelIndex, hardware: H, config: &DriveConfig) -> Self {
        let mut azimuth = PidController::new(
            config.azimuth.gains,
            config.azimuth.output_limit,
            config.azimuth.tolerance,
        )
        .continuous(360.0);
        azimuth.enable();

        let drive = PidController::new(
            config.drive.gains,
            config.drive.output_limit,
            config.drive.tolerance,
        );

        Self {
            index,
            hardware,
            azimuth,
            drive,
            drive_mode: DriveMode::Position,
            open_loop_drive: 0.0,
            distance_setpoint: 0.0,
            inverted: config.inverted[index.index()],
            distance_per_pulse: config.encoder.distance_per_pulse,
            count_offset: 0,
            angle: 0.0,
            distance: 0.0,
            rate: 0.0,
            stop_detector: StopDetector::new(config.encoder.min_rate, config.encoder.stop_debounce()),
            output: WheelOutput::default(),
            self_test: None,
        }
    }

    pub fn index(&self) -> WheelIndex {
        self.index
    }

    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    /// Read sensors and feed both loops
    pub fn sense(&mut self, dt: Duration) {
        self.hardware.poll(dt);

        let sign = if self.inverted { -1.0 } else { 1.0 };
        self.angle = self.hardware.azimuth_degrees().rem_euclid(360.0);
        let count = self.hardware.encoder_count();
        self.distance = sign * (count - self.count_offset) as f64 * self.distance_per_pulse;
        self.rate = sign * self.hardware.encoder_rate() * self.distance_per_pulse;

        self.azimuth.set_measurement(self.angle);
        self.drive.set_measurement(self.drive_measurement());
        self.stop_detector.update(self.rate, dt);
    }

    /// Run the enabled loops and write both power commands
    pub fn actuate(&mut self) -> WheelOutput {
        let turn = self.azimuth.calculate();
        let drive = if self.drive.is_enabled() {
            self.drive.calculate()
        } else {
            self.open_loop_drive.clamp(-1.0, 1.0)
        };

        let sign = if self.inverted { -1.0 } else { 1.0 };
        self.hardware.set_turn_power(turn);
        self.hardware.set_drive_power(sign * drive);

        self.output = WheelOutput { drive, turn };
        self.output
    }

    /// Teleop: steer toward `direction_degrees` and drive at `power`
    ///
    /// The stored setpoint is `360 - direction` for non-negative directions
    /// and `-direction` otherwise; this matches the steering encoder's
    /// polarity. Drive power is issued whether or not steering is on target,
    /// and a drive loop left running by autonomous is switched off.
    pub fn drive(&mut self, direction_degrees: f64, power: f64) {
        let direction = if direction_degrees < 0.0 {
            -direction_degrees
        } else {
            360.0 - direction_degrees
        };

        self.azimuth.set_setpoint(direction);
        self.hold(power);
    }

    /// Teleop without a new direction: keep the current azimuth setpoint
    /// and drive at `power`
    pub fn hold(&mut self, power: f64) {
        self.set_drive_rate_setpoint(power);
        if self.drive.is_enabled() {
            self.drive.disable();
        }

        if !self.azimuth.is_enabled() {
            self.azimuth.enable();
        }

        self.open_loop_drive = power;
    }

    /// Autonomous: steer first, then close the distance loop
    ///
    /// Returns true once the drive loop is running, on target, and the
    /// wheel has stopped rolling.
    pub fn drive_to_setpoint(&mut self) -> bool {
        if !self.azimuth.is_enabled() {
            self.azimuth.enable();
        }

        if self.azimuth.on_target() {
            self.switch_mode(DriveMode::Position);
            if !self.drive.is_enabled() {
                debug!(
                    wheel = self.index.name(),
                    angle = self.angle,
                    "azimuth on target, enabling drive loop"
                );
                self.drive.enable();
            }
        }

        self.is_settled()
    }

    /// Freeze both setpoints at the measured values, then disable both loops
    pub fn stop(&mut self) {
        self.azimuth.freeze_setpoint();
        self.azimuth.disable();
        self.drive.freeze_setpoint();
        self.drive.disable();
        self.open_loop_drive = 0.0;
    }

    /// Zero the distance and clear the drive loop; the loop stays off until re-gated
    pub fn reset_drive(&mut self) {
        self.count_offset = self.hardware.encoder_count();
        self.distance = 0.0;
        self.drive.reset();
        self.drive.set_measurement(self.drive_measurement());
    }

    /// Clear steering history; the measured angle is absolute and untouched
    pub fn reset_azimuth(&mut self) {
        self.azimuth.clear_history();
    }

    /// Reset both loops and leave the module idle
    pub fn disable(&mut self) {
        self.reset_drive();
        self.reset_azimuth();
        self.azimuth.disable();
        self.open_loop_drive = 0.0;
    }

    pub fn set_azimuth_setpoint(&mut self, degrees: f64) {
        self.azimuth.set_setpoint(degrees);
    }

    /// Switch to position control and target `inches`
    pub fn set_distance_setpoint(&mut self, inches: f64) {
        self.switch_mode(DriveMode::Position);
        self.distance_setpoint = inches;
        self.drive.set_setpoint(inches);
        self.open_loop_drive = 0.0;
    }

    /// Switch to rate control and target `rate`
    pub fn set_drive_rate_setpoint(&mut self, rate: f64) {
        self.switch_mode(DriveMode::Rate);
        self.drive.set_setpoint(rate);
    }

    pub fn enable_azimuth_loop(&mut self) {
        if !self.azimuth.is_enabled() {
            self.azimuth.enable();
        }
    }

    pub fn enable_drive_loop(&mut self) {
        if !self.drive.is_enabled() {
            self.drive.enable();
        }
    }

    pub fn set_drive_gains(&mut self, gains: PidGains) {
        self.drive.set_gains(gains);
    }

    pub fn set_azimuth_gains(&mut self, gains: PidGains) {
        self.azimuth.set_gains(gains);
    }

    fn switch_mode(&mut self, mode: DriveMode) {
        if self.drive_mode == mode {
            return;
        }
        self.drive_mode = mode;
        self.drive.clear_history();
        self.drive.set_setpoint_feed_forward(mode == DriveMode::Rate);
        self.drive.set_measurement(self.drive_measurement());
    }

    fn drive_measurement(&self) -> f64 {
        match self.drive_mode {
            DriveMode::Position => self.distance,
            DriveMode::Rate => self.rate,
        }
    }

    // Status

    pub fn is_settled(&self) -> bool {
        self.drive.is_enabled() && self.drive.on_target() && self.stop_detector.is_stopped()
    }

    pub fn azimuth_on_target(&self) -> bool {
        self.azimuth.on_target()
    }

    pub fn drive_on_target(&self) -> bool {
        self.drive.on_target()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_detector.is_stopped()
    }

    pub fn is_azimuth_loop_enabled(&self) -> bool {
        self.azimuth.is_enabled()
    }

    pub fn is_drive_loop_enabled(&self) -> bool {
        self.drive.is_enabled()
    }

    pub fn drive_mode(&self) -> DriveMode {
        self.drive_mode
    }

    pub fn output(&self) -> WheelOutput {
        self.output
    }

    // Diagnostics

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn angle_setpoint(&self) -> f64 {
        self.azimuth.setpoint()
    }

    pub fn angle_error(&self) -> f64 {
        self.azimuth.error()
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn distance_setpoint(&self) -> f64 {
        self.distance_setpoint
    }

    pub fn speed(&self) -> f64 {
        self.rate
    }

    pub fn speed_error(&self) -> f64 {
        self.drive.error()
    }

    /// Rate setpoint, or 0 while the drive loop is in position mode
    pub fn speed_setpoint(&self) -> f64 {
        match self.drive_mode {
            DriveMode::Rate => self.drive.setpoint(),
            DriveMode::Position => 0.0,
        }
    }

    // Bench test

    /// Arm the self test; call before the first run_self_test
    pub fn init_self_test(&mut self) {
        self.self_test = Some(SelfTest::Begin);
    }

    /// Step the self test at time `now`; true once it has finished
    ///
    /// Drive phase ramps power from full to zero over 3 s at 0°. Turn phase
    /// steers 120°, 240°, then 0° over the next 3 s with no drive power.
    pub fn run_self_test(&mut self, now: Duration) -> bool {
        let Some(state) = self.self_test else {
            return true;
        };

        let next = match state {
            SelfTest::Begin => SelfTest::DriveTest {
                until: now + SELF_TEST_PHASE,
            },
            SelfTest::DriveTest { until } if now < until => {
                let remaining = (until - now).as_secs_f64();
                self.drive(0.0, remaining / SELF_TEST_PHASE.as_secs_f64());
                state
            }
            SelfTest::DriveTest { .. } => {
                self.drive(0.0, 0.0);
                self.disable();
                SelfTest::TurnTest {
                    until: now + SELF_TEST_PHASE,
                }
            }
            SelfTest::TurnTest { until } if now < until => {
                let angle = match (until - now).as_secs() {
                    0 => 0.0,
                    1 => 240.0,
                    _ => 120.0,
                };
                self.drive(angle, 0.0);
                state
            }
            SelfTest::TurnTest { .. } => {
                self.drive(0.0, 0.0);
                self.disable();
                SelfTest::End
            }
            SelfTest::End => SelfTest::End,
        };

        if next != state {
            debug!(wheel = self.index.name(), ?next, "self test phase");
        }
        self.self_test = Some(next);
        next == SelfTest::End
    }
}
