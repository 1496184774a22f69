// Swerve inverse kinematics for the four-wheel base
// Converts a chassis motion intent (forward, strafe, rotate) to per-wheel
// azimuth and normalized speed.

use serde::{Deserialize, Serialize};

use crate::messages::MotionIntent;

/// Wheel positions, in the order every per-wheel array uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WheelIndex {
    FrontLeft = 0,
    FrontRight = 1,
    RearLeft = 2,
    RearRight = 3,
}

impl WheelIndex {
    pub const ALL: [WheelIndex; 4] = [
        WheelIndex::FrontLeft,
        WheelIndex::FrontRight,
        WheelIndex::RearLeft,
        WheelIndex::RearRight,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            WheelIndex::FrontLeft => "front_left",
            WheelIndex::FrontRight => "front_right",
            WheelIndex::RearLeft => "rear_left",
            WheelIndex::RearRight => "rear_right",
        }
    }
}

/// Chassis dimensions used by the kinematics and the rotate segments
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WheelbaseGeometry {
    /// Front-to-rear wheel spacing (any unit, only the ratio to width matters)
    pub length: f64,
    /// Left-to-right wheel spacing
    pub width: f64,
    /// Arc radius (inches) a wheel travels when the robot spins in place
    pub turn_radius_inches: f64,
}

impl WheelbaseGeometry {
    pub fn diagonal(&self) -> f64 {
        self.length.hypot(self.width)
    }
}

impl Default for WheelbaseGeometry {
    fn default() -> Self {
        Self {
            length: 1.0,
            width: 1.0,
            turn_radius_inches: 32.5,
        }
    }
}

/// Target for one wheel
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WheelCommand {
    /// Steering angle in [0, 360)
    pub azimuth_degrees: f64,
    /// Speed in [-1, 1]
    pub drive_normalized: f64,
}

/// Pure inverse kinematics, speeds normalized so none exceeds 1
///
/// Forward intent is inverted on entry (driver stick Y axis), so driving
/// forward points every wheel at 180°. Positive strafe is left (90°) and
/// positive rotate turns the robot left.
pub fn inverse_kinematics(intent: &MotionIntent, geometry: &WheelbaseGeometry) -> [WheelCommand; 4] {
    let forward = -intent.forward;
    let strafe = intent.strafe;
    let rotate = intent.rotate;

    let radius = geometry.diagonal();
    let a = strafe + rotate * (geometry.length / radius);
    let b = strafe - rotate * (geometry.length / radius);
    let c = forward + rotate * (geometry.width / radius);
    let d = forward - rotate * (geometry.width / radius);

    // (lateral, longitudinal) components per wheel, [FL, FR, RL, RR]
    let components = [(b, d), (b, c), (a, d), (a, c)];

    let mut speeds = components.map(|(x, y)| x.hypot(y));
    let azimuths = components.map(|(x, y)| x.atan2(y).to_degrees().rem_euclid(360.0));

    let max_speed = speeds.iter().cloned().fold(0.0f64, f64::max);
    if max_speed > 1.0 {
        for speed in &mut speeds {
            *speed /= max_speed;
        }
    }

    let mut commands = [WheelCommand::default(); 4];
    for i in 0..4 {
        commands[i] = WheelCommand {
            azimuth_degrees: azimuths[i],
            drive_normalized: speeds[i],
        };
    }
    commands
}

/// Stateful wrapper applying the power factor and the stationary hold
///
/// A wheel whose computed speed is exactly zero keeps the last azimuth it
/// was commanded with, so wheels do not snap to 0° when the sticks are
/// released.
#[derive(Debug, Clone)]
pub struct SwerveKinematics {
    geometry: WheelbaseGeometry,
    power_factor: f64,
    last_azimuths: [f64; 4],
}

impl SwerveKinematics {
    pub fn new(geometry: WheelbaseGeometry, power_factor: f64) -> Self {
        Self {
            geometry,
            power_factor,
            last_azimuths: [0.0; 4],
        }
    }

    pub fn geometry(&self) -> &WheelbaseGeometry {
        &self.geometry
    }

    pub fn power_factor(&self) -> f64 {
        self.power_factor
    }

    pub fn solve(&mut self, intent: &MotionIntent) -> [WheelCommand; 4] {
        let mut commands = inverse_kinematics(intent, &self.geometry);
        for (command, last) in commands.iter_mut().zip(self.last_azimuths.iter_mut()) {
            if command.drive_normalized == 0.0 {
                command.azimuth_degrees = *last;
            } else {
                *last = command.azimuth_degrees;
            }
            command.drive_normalized *= self.power_factor;
        }
        commands
    }
}
