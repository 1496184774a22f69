// Autonomous demo: drive a square, turn around, stop
//
// Usage: cargo run --example square_auto -- [side_inches]
// Puts the runtime in autonomous mode and queues the segments; the runtime
// works through them one at a time.
use std::time::Duration;
use tracing::info;

use swerve_drive_runtime::config::{TOPIC_CMD_MODE, TOPIC_CMD_SEGMENT};
use swerve_drive_runtime::messages::{RobotMode, SegmentRequest};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let side: f64 = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 24.0,
    };

    let session = zenoh::open(zenoh::Config::default()).await?;
    let pub_mode = session.declare_publisher(TOPIC_CMD_MODE).await?;
    let pub_segment = session.declare_publisher(TOPIC_CMD_SEGMENT).await?;

    pub_mode.put(serde_json::to_string(&RobotMode::Autonomous)?).await?;
    // Let the mode change land before the queue fills
    tokio::time::sleep(Duration::from_millis(100)).await;

    let plan = [
        SegmentRequest::Forward { inches: side },
        SegmentRequest::StrafeLeft { inches: side },
        SegmentRequest::Backward { inches: side },
        SegmentRequest::StrafeRight { inches: side },
        SegmentRequest::RotateLeft { degrees: 180.0 },
        SegmentRequest::Stop,
    ];

    for request in plan {
        info!("Queueing {:?}", request);
        pub_segment.put(serde_json::to_string(&request)?).await?;
    }

    info!("Queued {} segments, watch swerve/state/telemetry for progress", plan.len());
    Ok(())
}
