// Swerve drivetrain control runtime
//
// - swerve: kinematics, per-wheel control loops, autonomous segment queue
// - runtime: 50 Hz zenoh loop with intent watchdog and mode dispatch

pub mod clock;
pub mod config;
pub mod messages;
pub mod runtime;
pub mod swerve;
