// Four-module drivetrain: teleop kinematics path and autonomous segment queue

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::hardware::WheelHardware;
use super::kinematics::{SwerveKinematics, WheelIndex};
use super::pid::PidGains;
use super::segment::MotionSegment;
use super::wheel::{WheelActuator, WheelOutput};
use crate::config::DriveConfig;
use crate::messages::{DriveTelemetry, MotionIntent, WheelTelemetry};

/// Autonomous sequencing state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoState {
    Idle,
    RunningSegment,
    SegmentComplete,
}

/// Things that move the autonomous state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoEvent {
    /// A queued segment was pushed into the wheels
    Loaded,
    /// All four wheels reported on target and stopped
    Settled,
    /// A tick found no segment loaded and nothing queued
    NothingQueued,
    Reset,
}

impl AutoState {
    pub fn next(self, event: AutoEvent) -> AutoState {
        use AutoEvent::*;
        use AutoState::*;

        match (self, event) {
            (_, Reset) => Idle,
            (Idle | SegmentComplete, Loaded) => RunningSegment,
            (RunningSegment, Settled) => SegmentComplete,
            (SegmentComplete, NothingQueued) => Idle,
            (state, _) => state,
        }
    }
}

pub struct DrivetrainController<H> {
    wheels: [WheelActuator<H>; 4],
    kinematics: SwerveKinematics,
    queue: VecDeque<MotionSegment>,
    current: Option<MotionSegment>,
    state: AutoState,
    loads: u64,
}

impl<H: WheelHardware> DrivetrainController<H> {
    /// Bind one hardware module per wheel, in [FL, FR, RL, RR] order
    pub fn new(hardware: [H; 4], config: &DriveConfig) -> Self {
        let [fl, fr, rl, rr] = hardware;
        let wheels = [
            WheelActuator::new(WheelIndex::FrontLeft, fl, config),
            WheelActuator::new(WheelIndex::FrontRight, fr, config),
            WheelActuator::new(WheelIndex::RearLeft, rl, config),
            WheelActuator::new(WheelIndex::RearRight, rr, config),
        ];

        Self {
            wheels,
            kinematics: SwerveKinematics::new(config.geometry, config.power_factor),
            queue: VecDeque::new(),
            current: None,
            state: AutoState::Idle,
            loads: 0,
        }
    }

    /// One teleop tick: kinematics, then every wheel drives its command
    pub fn drive_teleop(&mut self, intent: &MotionIntent, dt: Duration) -> [WheelOutput; 4] {
        self.sense(dt);

        let commands = self.kinematics.solve(intent);
        for (wheel, command) in self.wheels.iter_mut().zip(commands) {
            // A stationary wheel keeps its own setpoint, which autonomous may have set
            if command.drive_normalized == 0.0 {
                wheel.hold(0.0);
            } else {
                wheel.drive(command.azimuth_degrees, command.drive_normalized);
            }
        }

        self.actuate()
    }

    /// Disabled tick: keep sensing and push the (zero) loop outputs out
    pub fn idle(&mut self, dt: Duration) -> [WheelOutput; 4] {
        self.sense(dt);
        self.actuate()
    }

    pub fn enqueue(&mut self, segment: MotionSegment) {
        debug!(?segment, queued = self.queue.len() + 1, "segment queued");
        self.queue.push_back(segment);
    }

    /// One autonomous tick: load the next segment if none is active, then
    /// step every wheel toward its setpoint.
    ///
    /// An empty queue leaves the loops holding their last setpoints.
    pub fn run_autonomous_tick(&mut self, dt: Duration) -> AutoState {
        self.sense(dt);

        if self.current.is_none() {
            match self.queue.pop_front() {
                Some(segment) => {
                    self.load(segment);
                    self.state = self.state.next(AutoEvent::Loaded);
                }
                None => self.state = self.state.next(AutoEvent::NothingQueued),
            }
        }

        if self.current.is_some() {
            // Every wheel gets its step, no short-circuit
            let settled = self
                .wheels
                .iter_mut()
                .fold(true, |all, wheel| wheel.drive_to_setpoint() && all);

            if settled {
                info!(
                    remaining = self.queue.len(),
                    distance = ?self.distances(),
                    "segment complete"
                );
                self.current = None;
                self.state = self.state.next(AutoEvent::Settled);
            }
        }

        self.actuate();
        self.state
    }

    /// True while every wheel is on its distance and has stopped rolling
    pub fn is_done(&self) -> bool {
        self.wheels.iter().all(|wheel| wheel.is_settled())
    }

    /// Freeze all setpoints at the measured values and disable every loop
    pub fn stop(&mut self) {
        info!("stopping drivetrain");
        for wheel in &mut self.wheels {
            wheel.stop();
        }
    }

    /// Disable and re-zero every wheel and drop all queued motion
    pub fn reset(&mut self) {
        info!(dropped = self.queue.len(), "resetting drivetrain");
        for wheel in &mut self.wheels {
            wheel.disable();
        }
        self.clear_segments();
        self.state = self.state.next(AutoEvent::Reset);
    }

    /// Drop queued segments and the loaded one, leaving the wheels alone
    pub fn clear_segments(&mut self) {
        self.queue.clear();
        self.current = None;
    }

    /// Arm the per-wheel bench test
    pub fn init_self_test(&mut self) {
        for wheel in &mut self.wheels {
            wheel.init_self_test();
        }
    }

    /// One bench-test tick; true once every wheel has finished
    pub fn run_self_test(&mut self, now: Duration, dt: Duration) -> bool {
        self.sense(dt);
        let mut finished = true;
        for wheel in &mut self.wheels {
            finished &= wheel.run_self_test(now);
        }
        self.actuate();
        finished
    }

    fn load(&mut self, segment: MotionSegment) {
        let targets = segment.azimuth_targets_degrees();
        for (wheel, target) in self.wheels.iter_mut().zip(targets) {
            let azimuth = if segment.holds_azimuth() {
                wheel.angle_setpoint()
            } else {
                target
            };
            wheel.set_azimuth_setpoint(azimuth);
            wheel.set_distance_setpoint(segment.distance_inches());
            wheel.reset_drive();
            wheel.enable_azimuth_loop();
        }

        self.loads += 1;
        self.current = Some(segment);
        info!(
            distance = segment.distance_inches(),
            azimuths = ?self.angle_setpoints(),
            remaining = self.queue.len(),
            "segment loaded"
        );
    }

    fn sense(&mut self, dt: Duration) {
        for wheel in &mut self.wheels {
            wheel.sense(dt);
        }
    }

    fn actuate(&mut self) -> [WheelOutput; 4] {
        self.wheels.each_mut().map(|wheel| wheel.actuate())
    }

    // Tuning and direct setpoints

    pub fn set_drive_gains(&mut self, wheel: WheelIndex, gains: PidGains) {
        self.wheels[wheel.index()].set_drive_gains(gains);
    }

    pub fn set_azimuth_gains(&mut self, wheel: WheelIndex, gains: PidGains) {
        self.wheels[wheel.index()].set_azimuth_gains(gains);
    }

    /// Point every wheel's distance loop at `inches`
    pub fn set_distance_setpoint(&mut self, inches: f64) {
        for wheel in &mut self.wheels {
            wheel.set_distance_setpoint(inches);
        }
    }

    /// Point every wheel at `degrees`
    pub fn set_azimuth_setpoint(&mut self, degrees: f64) {
        for wheel in &mut self.wheels {
            wheel.set_azimuth_setpoint(degrees);
        }
    }

    // Accessors

    pub fn wheel(&self, index: WheelIndex) -> &WheelActuator<H> {
        &self.wheels[index.index()]
    }

    pub fn wheel_mut(&mut self, index: WheelIndex) -> &mut WheelActuator<H> {
        &mut self.wheels[index.index()]
    }

    pub fn state(&self) -> AutoState {
        self.state
    }

    pub fn current_segment(&self) -> Option<&MotionSegment> {
        self.current.as_ref()
    }

    pub fn queued_segments(&self) -> usize {
        self.queue.len()
    }

    /// Number of segments loaded since construction
    pub fn loads(&self) -> u64 {
        self.loads
    }

    pub fn outputs(&self) -> [WheelOutput; 4] {
        self.wheels.each_ref().map(|wheel| wheel.output())
    }

    pub fn angles(&self) -> [f64; 4] {
        self.wheels.each_ref().map(|wheel| wheel.angle())
    }

    pub fn angle_setpoints(&self) -> [f64; 4] {
        self.wheels.each_ref().map(|wheel| wheel.angle_setpoint())
    }

    pub fn angle_errors(&self) -> [f64; 4] {
        self.wheels.each_ref().map(|wheel| wheel.angle_error())
    }

    pub fn distances(&self) -> [f64; 4] {
        self.wheels.each_ref().map(|wheel| wheel.distance())
    }

    pub fn average_distance(&self) -> f64 {
        self.distances().iter().sum::<f64>() / 4.0
    }

    pub fn distance_setpoints(&self) -> [f64; 4] {
        self.wheels.each_ref().map(|wheel| wheel.distance_setpoint())
    }

    pub fn speeds(&self) -> [f64; 4] {
        self.wheels.each_ref().map(|wheel| wheel.speed())
    }

    pub fn speed_errors(&self) -> [f64; 4] {
        self.wheels.each_ref().map(|wheel| wheel.speed_error())
    }

    /// Snapshot of every diagnostic for publishing
    pub fn telemetry(&self) -> DriveTelemetry {
        let wheels = self.wheels.each_ref().map(|wheel| WheelTelemetry {
            wheel: wheel.index(),
            angle: wheel.angle(),
            angle_setpoint: wheel.angle_setpoint(),
            angle_error: wheel.angle_error(),
            distance: wheel.distance(),
            distance_setpoint: wheel.distance_setpoint(),
            speed: wheel.speed(),
            speed_setpoint: wheel.speed_setpoint(),
            speed_error: wheel.speed_error(),
            azimuth_loop_enabled: wheel.is_azimuth_loop_enabled(),
            drive_loop_enabled: wheel.is_drive_loop_enabled(),
            on_target: wheel.is_settled(),
        });

        DriveTelemetry {
            auto_state: self.state,
            done: self.is_done(),
            queued_segments: self.queue.len(),
            current_segment: self.current.map(|segment| {
                let azimuth = if segment.holds_azimuth() {
                    self.wheels[0].angle_setpoint()
                } else {
                    segment.azimuth_targets_degrees()[0]
                };
                (azimuth, segment.distance_inches())
            }),
            average_distance: self.average_distance(),
            wheels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swerve::hardware::SimulatedWheel;
    use crate::swerve::segment::SegmentFactory;

    const DT: Duration = Duration::from_millis(20);

    fn drivetrain() -> DrivetrainController<SimulatedWheel> {
        let mut config = DriveConfig::default();
        config.drive.gains = PidGains::new(0.02, 0.0, 0.0, 0.0);
        let dpp = config.encoder.distance_per_pulse;
        DrivetrainController::new(std::array::from_fn(|_| SimulatedWheel::new(dpp)), &config)
    }

    fn factory() -> SegmentFactory {
        SegmentFactory::new(Default::default())
    }

    fn run_segment(dt: &mut DrivetrainController<SimulatedWheel>, segment: MotionSegment) {
        dt.enqueue(segment);
        for _ in 0..1500 {
            dt.run_autonomous_tick(DT);
            if dt.current_segment().is_none() {
                return;
            }
        }
        panic!("segment never completed");
    }

    #[test]
    fn test_transition_table() {
        use AutoEvent::*;
        use AutoState::*;

        assert_eq!(Idle.next(Loaded), RunningSegment);
        assert_eq!(Idle.next(Settled), Idle);
        assert_eq!(RunningSegment.next(Settled), SegmentComplete);
        assert_eq!(RunningSegment.next(NothingQueued), RunningSegment);
        assert_eq!(SegmentComplete.next(Loaded), RunningSegment);
        assert_eq!(SegmentComplete.next(NothingQueued), Idle);
        assert_eq!(RunningSegment.next(Reset), Idle);
    }

    #[test]
    fn test_teleop_drives_all_wheels() {
        let mut dt = drivetrain();
        let outputs = dt.drive_teleop(
            &MotionIntent {
                forward: 1.0,
                strafe: 0.0,
                rotate: 0.0,
            },
            DT,
        );
        for (i, out) in outputs.iter().enumerate() {
            assert!((out.drive - 0.75).abs() < 1e-9, "wheel {i}");
        }
        for setpoint in dt.angle_setpoints() {
            assert!((setpoint - 180.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_zero_intent_holds_azimuth_setpoints() {
        let mut dt = drivetrain();
        dt.drive_teleop(
            &MotionIntent {
                forward: 0.4,
                strafe: -0.7,
                rotate: 0.2,
            },
            DT,
        );
        let before = dt.angle_setpoints();

        let outputs = dt.drive_teleop(&MotionIntent::default(), DT);
        assert_eq!(dt.angle_setpoints(), before);
        for out in outputs {
            assert_eq!(out.drive, 0.0);
        }
    }

    #[test]
    fn test_zero_intent_after_autonomous_keeps_segment_azimuths() {
        let mut dt = drivetrain();
        run_segment(&mut dt, factory().rotate_left(90.0));
        let before = dt.angle_setpoints();
        assert_eq!(before, [225.0, 315.0, 135.0, 45.0]);

        dt.reset();
        let outputs = dt.drive_teleop(&MotionIntent::default(), DT);
        assert_eq!(dt.angle_setpoints(), before);
        for out in outputs {
            assert_eq!(out.drive, 0.0);
        }
    }

    #[test]
    fn test_teleop_right_after_segment_gets_full_power() {
        let mut dt = drivetrain();
        run_segment(&mut dt, factory().forward(24.0));
        assert!(dt.wheel(WheelIndex::FrontLeft).is_drive_loop_enabled());

        let forward = MotionIntent {
            forward: 1.0,
            strafe: 0.0,
            rotate: 0.0,
        };
        dt.drive_teleop(&forward, DT);
        let outputs = dt.drive_teleop(&forward, DT);
        for out in outputs {
            assert!((out.drive - 0.75).abs() < 1e-9);
        }
        for index in WheelIndex::ALL {
            assert!(!dt.wheel(index).is_drive_loop_enabled());
        }
    }

    #[test]
    fn test_load_pushes_segment_into_wheels() {
        let mut dt = drivetrain();
        dt.enqueue(factory().rotate_left(90.0));

        assert_eq!(dt.run_autonomous_tick(DT), AutoState::RunningSegment);
        assert_eq!(dt.loads(), 1);
        assert_eq!(dt.queued_segments(), 0);
        assert_eq!(dt.angle_setpoints(), [225.0, 315.0, 135.0, 45.0]);
        for setpoint in dt.distance_setpoints() {
            assert!((setpoint - 32.5 * std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        }
        assert!(dt.current_segment().is_some());
    }

    #[test]
    fn test_empty_queue_idles() {
        let mut dt = drivetrain();
        assert_eq!(dt.run_autonomous_tick(DT), AutoState::Idle);
        assert_eq!(dt.loads(), 0);
        assert!(!dt.is_done());
    }

    #[test]
    fn test_stop_segment_keeps_azimuths() {
        let mut dt = drivetrain();
        dt.set_azimuth_setpoint(135.0);
        dt.enqueue(factory().stop());
        dt.run_autonomous_tick(DT);
        assert_eq!(dt.angle_setpoints(), [135.0; 4]);
        assert_eq!(dt.distance_setpoints(), [0.0; 4]);
    }

    #[test]
    fn test_reset_clears_queue_and_loops() {
        let mut dt = drivetrain();
        dt.enqueue(factory().forward(24.0));
        dt.enqueue(factory().strafe_left(12.0));
        dt.run_autonomous_tick(DT);

        dt.reset();
        assert_eq!(dt.queued_segments(), 0);
        assert!(dt.current_segment().is_none());
        assert_eq!(dt.state(), AutoState::Idle);
        for index in WheelIndex::ALL {
            assert!(!dt.wheel(index).is_azimuth_loop_enabled());
            assert!(!dt.wheel(index).is_drive_loop_enabled());
            assert_eq!(dt.wheel(index).distance(), 0.0);
        }

        // Idempotent
        dt.reset();
        assert_eq!(dt.state(), AutoState::Idle);
    }

    #[test]
    fn test_stop_disables_but_keeps_queue() {
        let mut dt = drivetrain();
        dt.enqueue(factory().forward(24.0));
        dt.enqueue(factory().forward(24.0));
        dt.run_autonomous_tick(DT);
        dt.stop();
        dt.stop();

        assert_eq!(dt.queued_segments(), 1);
        for index in WheelIndex::ALL {
            assert!(!dt.wheel(index).is_azimuth_loop_enabled());
        }
    }

    #[test]
    fn test_telemetry_reports_current_segment() {
        let mut dt = drivetrain();
        dt.enqueue(factory().strafe_right(30.0));
        dt.run_autonomous_tick(DT);

        let telemetry = dt.telemetry();
        assert_eq!(telemetry.current_segment, Some((270.0, 30.0)));
        assert_eq!(telemetry.auto_state, AutoState::RunningSegment);
        assert_eq!(telemetry.wheels[3].wheel, WheelIndex::RearRight);
        assert!(!telemetry.done);
    }

    #[test]
    fn test_telemetry_reports_held_azimuth_for_stop() {
        let mut dt = drivetrain();
        dt.set_azimuth_setpoint(135.0);
        dt.enqueue(factory().stop());
        dt.run_autonomous_tick(DT);

        assert_eq!(dt.telemetry().current_segment, Some((135.0, 0.0)));
    }

    #[test]
    fn test_per_wheel_gains() {
        let mut dt = drivetrain();
        let gains = PidGains::new(0.5, 0.0, 0.0, 0.0);
        dt.set_drive_gains(WheelIndex::RearLeft, gains);
        dt.set_azimuth_gains(WheelIndex::FrontRight, gains);
        dt.set_distance_setpoint(10.0);
        dt.wheel_mut(WheelIndex::RearLeft).enable_drive_loop();
        dt.wheel_mut(WheelIndex::FrontLeft).enable_drive_loop();
        assert_eq!(dt.run_autonomous_tick(DT), AutoState::Idle);

        // 0.5 * 10 clamps at the drive limit, 0.02 * 10 does not
        assert_eq!(dt.outputs()[WheelIndex::RearLeft.index()].drive, 0.25);
        assert!((dt.outputs()[WheelIndex::FrontLeft.index()].drive - 0.2).abs() < 1e-9);
    }
}
