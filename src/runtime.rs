// 50 Hz drivetrain loop with intent watchdog
// Note: the watchdog zeroes the teleop intent when the input layer goes quiet,
// so a crashed publisher leaves the wheels holding azimuth with no drive power

use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info, warn};

// local imports
use crate::clock::{Clock, MonotonicClock, TickTimer};
use crate::config::{
    CMD_TIMEOUT, DriveConfig, LOOP_HZ, LOOP_PERIOD, TOPIC_CMD_INTENT, TOPIC_CMD_MODE,
    TOPIC_CMD_SEGMENT, TOPIC_HEALTH, TOPIC_RT_WHEELS, TOPIC_TELEMETRY,
};
use crate::messages::{DriveActuation, MotionIntent, RobotMode, RuntimeHealth, SegmentRequest};
use crate::swerve::{DrivetrainController, SegmentFactory, SimulatedWheel, WheelHardware};

// Telemetry goes out every Nth tick
const TELEMETRY_EVERY: u64 = 5;

pub struct Runtime<H> {
    drivetrain: DrivetrainController<H>,
    factory: SegmentFactory,
    mode: RobotMode,
    latest_intent: Option<MotionIntent>,
    intent_received_at: Duration,
    self_test_started: Duration,
    self_test_done: bool,
    health: RuntimeHealth,
}

impl<H: WheelHardware> Runtime<H> {
    pub fn new(hardware: [H; 4], config: &DriveConfig) -> Self {
        // Start disabled: nothing moves until a mode arrives
        let mut drivetrain = DrivetrainController::new(hardware, config);
        drivetrain.stop();

        Self {
            drivetrain,
            factory: SegmentFactory::new(config.geometry),
            mode: RobotMode::Disabled,
            latest_intent: None,
            intent_received_at: Duration::ZERO,
            self_test_started: Duration::ZERO,
            self_test_done: false,
            health: RuntimeHealth::Disabled,
        }
    }

    pub fn drivetrain(&self) -> &DrivetrainController<H> {
        &self.drivetrain
    }

    pub fn drivetrain_mut(&mut self) -> &mut DrivetrainController<H> {
        &mut self.drivetrain
    }

    pub fn mode(&self) -> RobotMode {
        self.mode
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    /// Process incoming teleop intent
    pub fn on_intent(&mut self, intent: MotionIntent, now: Duration) {
        debug!("Received intent: {:?}", &intent);
        self.latest_intent = Some(intent.clamped());
        self.intent_received_at = now;
    }

    /// Switch modes; every transition starts from a reset drivetrain
    pub fn on_mode(&mut self, mode: RobotMode, now: Duration) {
        if mode == self.mode {
            return;
        }
        info!("Mode change: {:?} -> {:?}", self.mode, mode);

        self.drivetrain.reset();
        match mode {
            RobotMode::Disabled => self.drivetrain.stop(),
            RobotMode::Test => {
                self.drivetrain.init_self_test();
                self.self_test_started = now;
                self.self_test_done = false;
            }
            RobotMode::Teleop | RobotMode::Autonomous => {}
        }
        self.latest_intent = None;
        self.mode = mode;
    }

    /// Build and queue an autonomous segment
    pub fn on_segment(&mut self, request: SegmentRequest) {
        if self.mode != RobotMode::Autonomous {
            warn!("Segment {:?} queued outside autonomous mode", request);
        }
        self.drivetrain.enqueue(request.build(&self.factory));
    }

    /// Run one control tick for the current mode
    pub fn step(&mut self, now: Duration, dt: Duration) -> DriveActuation {
        match self.mode {
            RobotMode::Disabled => {
                self.health = RuntimeHealth::Disabled;
                DriveActuation::from(self.drivetrain.idle(dt))
            }
            RobotMode::Teleop => {
                let intent = self.current_intent(now);
                DriveActuation::from(self.drivetrain.drive_teleop(&intent, dt))
            }
            RobotMode::Autonomous => {
                self.health = RuntimeHealth::Ok;
                self.drivetrain.run_autonomous_tick(dt);
                DriveActuation::from(self.drivetrain.outputs())
            }
            RobotMode::Test => {
                self.health = RuntimeHealth::Ok;
                let elapsed = now.saturating_sub(self.self_test_started);
                let finished = self.drivetrain.run_self_test(elapsed, dt);
                if finished && !self.self_test_done {
                    info!("Wheel self test finished after {:?}", elapsed);
                    self.self_test_done = true;
                }
                DriveActuation::from(self.drivetrain.outputs())
            }
        }
    }

    /// Latest intent, or the zero intent once the watchdog has tripped
    fn current_intent(&mut self, now: Duration) -> MotionIntent {
        let age = now.saturating_sub(self.intent_received_at);

        match self.latest_intent {
            Some(intent) if age <= CMD_TIMEOUT => {
                self.health = RuntimeHealth::Ok;
                intent
            }
            Some(_) => {
                // Watchdog triggered - drop drive power, keep azimuth
                if self.health != RuntimeHealth::IntentStale {
                    warn!("Intent stale ({:?} old), zeroing drive", age);
                }
                self.health = RuntimeHealth::IntentStale;
                MotionIntent::default()
            }
            None => {
                // No intent received since entering teleop
                self.health = RuntimeHealth::IntentStale;
                MotionIntent::default()
            }
        }
    }
}

pub async fn run(config: DriveConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let sub_intent = session.declare_subscriber(TOPIC_CMD_INTENT).await?;
    let sub_mode = session.declare_subscriber(TOPIC_CMD_MODE).await?;
    let sub_segment = session.declare_subscriber(TOPIC_CMD_SEGMENT).await?;
    let pub_wheels = session.declare_publisher(TOPIC_RT_WHEELS).await?;
    let pub_telemetry = session.declare_publisher(TOPIC_TELEMETRY).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    // Device drivers live outside this crate; run against the simulated plant
    let dpp = config.encoder.distance_per_pulse;
    let hardware = std::array::from_fn(|_| SimulatedWheel::new(dpp));
    let mut runtime = Runtime::new(hardware, &config);

    let clock = MonotonicClock::new();
    let mut timer = TickTimer::default();
    let mut tick = interval(LOOP_PERIOD);
    let mut ticks: u64 = 0;

    info!(
        "Runtime started: {}Hz loop, {}ms intent watchdog, power factor {}",
        LOOP_HZ,
        CMD_TIMEOUT.as_millis(),
        config.power_factor
    );
    info!(
        "Subscribed to: {}, {}, {}",
        TOPIC_CMD_INTENT, TOPIC_CMD_MODE, TOPIC_CMD_SEGMENT
    );
    info!(
        "Publishing to: {}, {}, {}",
        TOPIC_RT_WHEELS, TOPIC_TELEMETRY, TOPIC_HEALTH
    );

    loop {
        tick.tick().await;
        let dt = timer.delta(&clock, LOOP_PERIOD);
        let now = clock.elapsed();

        // 1. Drain pending mode changes first so this tick runs in the new mode
        while let Ok(Some(sample)) = sub_mode.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<RobotMode>(&payload) {
                Ok(mode) => runtime.on_mode(mode, now),
                Err(e) => warn!("Failed to parse mode: {}", e),
            }
        }

        // 2. Queue segments in arrival order
        while let Ok(Some(sample)) = sub_segment.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<SegmentRequest>(&payload) {
                Ok(request) => runtime.on_segment(request),
                Err(e) => warn!("Failed to parse segment: {}", e),
            }
        }

        // 3. Keep only the latest intent
        while let Ok(Some(sample)) = sub_intent.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<MotionIntent>(&payload) {
                Ok(intent) => runtime.on_intent(intent, now),
                Err(e) => warn!("Failed to parse intent: {}", e),
            }
        }

        // 4. Control tick (includes watchdog logic)
        let actuation = runtime.step(now, dt);

        // 5. Publish actuation and health
        let actuation_json = serde_json::to_string(&actuation)?;
        pub_wheels.put(actuation_json).await?;

        let health_json = serde_json::to_string(&runtime.health())?;
        pub_health.put(health_json).await?;

        // 6. Telemetry at a lower rate
        if ticks % TELEMETRY_EVERY == 0 {
            let telemetry_json = serde_json::to_string(&runtime.drivetrain().telemetry())?;
            pub_telemetry.put(telemetry_json).await?;
        }
        ticks += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::swerve::{AutoState, WheelIndex};

    fn runtime() -> Runtime<SimulatedWheel> {
        let config = DriveConfig::default();
        let dpp = config.encoder.distance_per_pulse;
        Runtime::new(std::array::from_fn(|_| SimulatedWheel::new(dpp)), &config)
    }

    fn forward() -> MotionIntent {
        MotionIntent {
            forward: 1.0,
            strafe: 0.0,
            rotate: 0.0,
        }
    }

    #[test]
    fn test_starts_disabled_with_zero_output() {
        let mut rt = runtime();
        let actuation = rt.step(Duration::ZERO, LOOP_PERIOD);
        assert_eq!(actuation, DriveActuation::default());
        assert_eq!(rt.health(), RuntimeHealth::Disabled);
    }

    #[test]
    fn test_teleop_follows_fresh_intent() {
        let clock = ManualClock::new();
        let mut rt = runtime();
        rt.on_mode(RobotMode::Teleop, clock.elapsed());
        rt.on_intent(forward(), clock.elapsed());

        clock.advance(LOOP_PERIOD);
        let actuation = rt.step(clock.elapsed(), LOOP_PERIOD);
        assert_eq!(rt.health(), RuntimeHealth::Ok);
        for wheel in actuation.wheels {
            assert!((wheel.drive - 0.75).abs() < 1e-9);
        }
    }

    #[test]
    fn test_watchdog_zeroes_stale_intent() {
        let clock = ManualClock::new();
        let mut rt = runtime();
        rt.on_mode(RobotMode::Teleop, clock.elapsed());
        rt.on_intent(forward(), clock.elapsed());
        rt.step(clock.elapsed(), LOOP_PERIOD);
        let held = rt.drivetrain().angle_setpoints();

        clock.advance(CMD_TIMEOUT + Duration::from_millis(1));
        let actuation = rt.step(clock.elapsed(), LOOP_PERIOD);
        assert_eq!(rt.health(), RuntimeHealth::IntentStale);
        for wheel in actuation.wheels {
            assert_eq!(wheel.drive, 0.0);
        }
        assert_eq!(rt.drivetrain().angle_setpoints(), held);
    }

    #[test]
    fn test_disabling_cuts_hardware_power() {
        let clock = ManualClock::new();
        let mut rt = runtime();
        rt.on_mode(RobotMode::Teleop, clock.elapsed());
        rt.on_intent(forward(), clock.elapsed());
        rt.step(clock.elapsed(), LOOP_PERIOD);
        assert!(rt.drivetrain().wheel(WheelIndex::FrontLeft).hardware().drive_power() > 0.0);

        rt.on_mode(RobotMode::Disabled, clock.elapsed());
        clock.advance(LOOP_PERIOD);
        let actuation = rt.step(clock.elapsed(), LOOP_PERIOD);
        assert_eq!(actuation, DriveActuation::default());
        for index in WheelIndex::ALL {
            let hardware = rt.drivetrain().wheel(index).hardware();
            assert_eq!(hardware.drive_power(), 0.0);
            assert_eq!(hardware.turn_power(), 0.0);
        }
    }

    #[test]
    fn test_teleop_without_intent_is_stale() {
        let mut rt = runtime();
        rt.on_mode(RobotMode::Teleop, Duration::ZERO);
        rt.step(Duration::ZERO, LOOP_PERIOD);
        assert_eq!(rt.health(), RuntimeHealth::IntentStale);
    }

    #[test]
    fn test_mode_change_drops_queued_segments() {
        let mut rt = runtime();
        rt.on_mode(RobotMode::Autonomous, Duration::ZERO);
        rt.on_segment(SegmentRequest::Forward { inches: 24.0 });
        rt.on_segment(SegmentRequest::Stop);
        assert_eq!(rt.drivetrain().queued_segments(), 2);

        rt.on_mode(RobotMode::Teleop, Duration::ZERO);
        assert_eq!(rt.drivetrain().queued_segments(), 0);
        assert_eq!(rt.drivetrain().state(), AutoState::Idle);
    }

    #[test]
    fn test_autonomous_loads_segment() {
        let mut rt = runtime();
        rt.on_mode(RobotMode::Autonomous, Duration::ZERO);
        rt.on_segment(SegmentRequest::StrafeLeft { inches: 12.0 });
        rt.step(LOOP_PERIOD, LOOP_PERIOD);
        assert_eq!(rt.drivetrain().state(), AutoState::RunningSegment);
        assert_eq!(rt.drivetrain().angle_setpoints(), [90.0; 4]);
    }

    #[test]
    fn test_self_test_runs_to_completion() {
        let clock = ManualClock::new();
        let mut rt = runtime();
        rt.on_mode(RobotMode::Test, clock.elapsed());
        for _ in 0..(8 * LOOP_HZ) {
            clock.advance(LOOP_PERIOD);
            rt.step(clock.elapsed(), LOOP_PERIOD);
        }
        assert!(rt.self_test_done);
    }

    #[test]
    fn test_same_mode_is_noop() {
        let mut rt = runtime();
        rt.on_mode(RobotMode::Autonomous, Duration::ZERO);
        rt.on_segment(SegmentRequest::Backward { inches: 6.0 });
        rt.on_mode(RobotMode::Autonomous, Duration::ZERO);
        assert_eq!(rt.drivetrain().queued_segments(), 1);
    }
}
