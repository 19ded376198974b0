use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use worldpager::{WorldConfig, WorldPosition, WorldResult};

/// Headless run of the demo world: flies the follower along +x and logs what
/// every grid streams in and out.
#[derive(Debug, Parser)]
#[command(name = "worldpager-demo", version)]
struct Args {
    /// World config to load; the built-in demo world is used if it is missing
    #[arg(long, default_value = "world.toml")]
    config: PathBuf,

    /// Number of ticks to run
    #[arg(long, default_value_t = 120)]
    ticks: u64,

    /// Follower speed in world units per tick
    #[arg(long, default_value_t = 4.0)]
    speed: f32,

    /// Pause between ticks in milliseconds
    #[arg(long, default_value_t = 16)]
    tick_ms: u64,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print every tick report as a JSON line
    #[arg(long)]
    json: bool,
}

fn init_tracing(args: &Args) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    if args.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().with_writer(std::io::stderr).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    }
}

fn run(args: &Args) -> WorldResult<()> {
    let config = WorldConfig::load_or_default(&args.config)?;
    let mut world = config.build_world()?;
    info!(grids = ?world.grid_names(), workers = world.worker_count(), "World ready");

    let mut position = WorldPosition::default();
    for _ in 0..args.ticks {
        let report = world.update(position);
        if args.json {
            match serde_json::to_string(&report) {
                Ok(line) => println!("{line}"),
                Err(err) => error!(%err, "Failed to encode tick report"),
            }
        }
        position.x += args.speed;
        thread::sleep(Duration::from_millis(args.tick_ms));
    }

    for grid in world.grids() {
        info!(
            grid = grid.name(),
            loaded = grid.loaded_count(),
            in_flight = grid.in_flight_count(),
            instances = grid.loaded().map(|(_, payload)| payload.instance_count()).sum::<usize>(),
            "Final grid state"
        );
    }
    world.shutdown();
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args);
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "worldpager-demo failed");
            ExitCode::FAILURE
        }
    }
}
