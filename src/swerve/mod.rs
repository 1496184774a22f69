// Swerve drivetrain control core
//
// Provides:
// - Holonomic inverse kinematics (motion intent -> wheel azimuth/speed)
// - Per-wheel steering and drive loops over a hardware trait
// - Autonomous segment queue and the factory for standard moves

mod drivetrain;
pub mod hardware;
pub mod kinematics;
pub mod pid;
mod segment;
mod wheel;

pub use drivetrain::{AutoEvent, AutoState, DrivetrainController};
pub use hardware::{SimulatedWheel, WheelHardware};
pub use kinematics::{inverse_kinematics, SwerveKinematics, WheelCommand, WheelIndex, WheelbaseGeometry};
pub use pid::{PidController, PidGains};
pub use segment::{MotionSegment, SegmentFactory};
pub use wheel::{DriveMode, StopDetector, WheelActuator, WheelOutput};
