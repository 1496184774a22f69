// Define message types for the runtime

use serde::{Deserialize, Serialize};

use crate::swerve::{AutoState, MotionSegment, SegmentFactory, WheelIndex, WheelOutput};

// Teleop intent from the input layer -> runtime
// Each axis is in [-1, 1], already deadbanded and shaped upstream
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionIntent {
    pub forward: f64,
    pub strafe: f64,
    pub rotate: f64,
}

impl MotionIntent {
    /// Clamp every axis into [-1, 1], mapping NaN to 0
    pub fn clamped(self) -> Self {
        let clamp = |v: f64| if v.is_nan() { 0.0 } else { v.clamp(-1.0, 1.0) };
        Self {
            forward: clamp(self.forward),
            strafe: clamp(self.strafe),
            rotate: clamp(self.rotate),
        }
    }
}

/// Which path drives the wheels each tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotMode {
    #[default]
    Disabled,
    Teleop,
    Autonomous,
    Test,
}

// Autonomous move request -> runtime queue
// e.g. {"move": "forward", "inches": 24} or {"move": "rotate_left", "degrees": 90}
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "move", rename_all = "snake_case")]
pub enum SegmentRequest {
    Forward { inches: f64 },
    Backward { inches: f64 },
    StrafeLeft { inches: f64 },
    StrafeRight { inches: f64 },
    RotateLeft { degrees: f64 },
    RotateRight { degrees: f64 },
    Stop,
}

impl SegmentRequest {
    pub fn build(&self, factory: &SegmentFactory) -> MotionSegment {
        match *self {
            SegmentRequest::Forward { inches } => factory.forward(inches),
            SegmentRequest::Backward { inches } => factory.backward(inches),
            SegmentRequest::StrafeLeft { inches } => factory.strafe_left(inches),
            SegmentRequest::StrafeRight { inches } => factory.strafe_right(inches),
            SegmentRequest::RotateLeft { degrees } => factory.rotate_left(degrees),
            SegmentRequest::RotateRight { degrees } => factory.rotate_right(degrees),
            SegmentRequest::Stop => factory.stop(),
        }
    }
}

// Per-wheel power commands runtime -> actuator drivers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelActuation {
    pub wheel: WheelIndex,
    pub drive: f64,
    pub turn: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveActuation {
    pub wheels: [WheelActuation; 4],
}

impl From<[WheelOutput; 4]> for DriveActuation {
    fn from(outputs: [WheelOutput; 4]) -> Self {
        Self {
            wheels: std::array::from_fn(|i| WheelActuation {
                wheel: WheelIndex::ALL[i],
                drive: outputs[i].drive,
                turn: outputs[i].turn,
            }),
        }
    }
}

impl Default for DriveActuation {
    fn default() -> Self {
        Self::from([WheelOutput::default(); 4])
    }
}

/// Diagnostics for one wheel, telemetry only
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelTelemetry {
    pub wheel: WheelIndex,
    pub angle: f64,
    pub angle_setpoint: f64,
    pub angle_error: f64,
    pub distance: f64,
    pub distance_setpoint: f64,
    pub speed: f64,
    pub speed_setpoint: f64,
    pub speed_error: f64,
    pub azimuth_loop_enabled: bool,
    pub drive_loop_enabled: bool,
    pub on_target: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveTelemetry {
    pub auto_state: AutoState,
    pub done: bool,
    pub queued_segments: usize,
    /// (first wheel azimuth, distance) of the loaded segment
    pub current_segment: Option<(f64, f64)>,
    pub average_distance: f64,
    pub wheels: [WheelTelemetry; 4],
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    IntentStale,
    Disabled,
}
