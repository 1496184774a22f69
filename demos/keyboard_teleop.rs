// Keyboard teleop: WASD translate, Z/X rotate, R/F power, Q quit
// Switches the runtime to teleop on start and back to disabled on exit.
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::{Duration, Instant};
use tracing::info;

use swerve_drive_runtime::config::{TOPIC_CMD_INTENT, TOPIC_CMD_MODE};
use swerve_drive_runtime::messages::{MotionIntent, RobotMode};

const LEVELS: [f64; 3] = [0.25, 0.5, 1.0]; // fraction of full stick
const INPUT_TIMEOUT_MS: u64 = 100; // Release the sticks after this much time with no input

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let pub_intent = session.declare_publisher(TOPIC_CMD_INTENT).await?;
    let pub_mode = session.declare_publisher(TOPIC_CMD_MODE).await?;

    pub_mode.put(serde_json::to_string(&RobotMode::Teleop)?).await?;

    info!("Controls: WASD=move, Z/X=rotate, R/F=power, Q=quit");
    info!("Power: LOW");

    enable_raw_mode()?;
    let result = run_teleop(&pub_intent).await;
    disable_raw_mode()?;

    pub_mode.put(serde_json::to_string(&RobotMode::Disabled)?).await?;
    result
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut level: usize = 0;
    let mut intent = MotionIntent::default();
    let mut last_movement_input = Instant::now();

    loop {
        // Poll for key with 20ms timeout (50Hz effective rate)
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;
                let value = LEVELS[level];

                match code {
                    KeyCode::Char('w') if pressed => {
                        intent.forward = value;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('s') if pressed => {
                        intent.forward = -value;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('a') if pressed => {
                        intent.strafe = value;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('d') if pressed => {
                        intent.strafe = -value;
                        last_movement_input = Instant::now();
                    }

                    // Rotation
                    KeyCode::Char('z') if pressed => {
                        intent.rotate = value;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('x') if pressed => {
                        intent.rotate = -value;
                        last_movement_input = Instant::now();
                    }

                    // Power level
                    KeyCode::Char('r') if pressed => {
                        level = (level + 1).min(LEVELS.len() - 1);
                        print_level(level);
                    }
                    KeyCode::Char('f') if pressed => {
                        level = level.saturating_sub(1);
                        print_level(level);
                    }

                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }

        if last_movement_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            intent = MotionIntent::default();
        }

        // Always publish at ~50Hz so the runtime watchdog stays fed
        publisher.put(serde_json::to_string(&intent)?).await?;
    }

    Ok(())
}

fn print_level(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Power: {}", label);
}
