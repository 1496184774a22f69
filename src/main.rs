use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use swerve_drive_runtime::config::DriveConfig;

/// Swerve drivetrain control runtime
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON tuning file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Default log directive when RUST_LOG does not set one
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Setup logging (RUST_LOG takes precedence over --log-level)
    let directive = match args.log_level.parse() {
        Ok(directive) => directive,
        Err(e) => {
            eprintln!("Invalid --log-level {:?}: {}", args.log_level, e);
            std::process::exit(2);
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .init();

    let config = match DriveConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {}", e);
            std::process::exit(2);
        }
    };
    info!("Loaded drive config: {:?}", config);

    if let Err(e) = swerve_drive_runtime::runtime::run(config).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
