//! # CNC Controller
//!
//! Replays a command program against the simulated stepper backend with
//! the same three execution contexts the firmware uses: the command
//! producer (this thread), the background pass and the tick source.

use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use cnc_common::config::{ConfigError, ControllerConfig, LogLevel};
use cnc_common::events::EventBuffer;
use cnc_control::command::{Dispatcher, Reply};
use cnc_control::planner::Planner;
use cnc_control::runtime::{Runtime, Timing};
use cnc_control::shared::SharedPlanner;
use cnc_control::sim::SimulatedSteppers;

/// How often the producer re-checks for a free slot or a drained queue.
const POLL: Duration = Duration::from_millis(2);

/// CNC controller: replay a command program on simulated steppers
#[derive(Parser, Debug)]
#[command(name = "cnc_control")]
#[command(version)]
#[command(about = "Motion command queue and step generator for stepper CNC machines")]
struct Args {
    /// Path to the controller configuration TOML.
    #[arg(short, long, default_value = "config/controller.toml")]
    config: PathBuf,

    /// Command program, one frame per line.
    program: PathBuf,

    /// Speed-up factor applied to all step delays.
    #[arg(long, default_value_t = 1.0)]
    time_scale: f64,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    let config = load_config(&args);
    setup_tracing(&args, config.as_ref().map(|c| c.shared.log_level).ok());

    info!("CNC controller v{} starting...", env!("CARGO_PKG_VERSION"));

    let result = config
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
        .and_then(|config| run(&args, config));
    if let Err(e) = result {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("CNC controller shutdown complete");
}

fn load_config(args: &Args) -> Result<ControllerConfig, ConfigError> {
    if args.config.exists() {
        ControllerConfig::load_validated(&args.config)
    } else {
        Ok(ControllerConfig::default())
    }
}

fn run(args: &Args, config: ControllerConfig) -> Result<(), Box<dyn std::error::Error>> {
    if !args.config.exists() {
        warn!(
            "Config '{}' not found, using defaults",
            args.config.display()
        );
    }
    info!(
        "Config OK: service={}, steps_per_unit={:?}, tick_base={}µs",
        config.shared.service_name, config.machine.steps_per_unit, config.machine.tick_base_us
    );

    let program = fs::read_to_string(&args.program)?;

    let mut planner = Planner::new(SimulatedSteppers::new(), EventBuffer::new(), &config.machine);
    if !planner.unlock() {
        return Err("hardware not configured".into());
    }
    let shared: SharedPlanner<_, _> = SharedPlanner::new(planner);
    let dispatcher = Dispatcher::new(&config.machine);
    let runtime = Runtime::spawn(
        &shared,
        Timing::new(config.machine.tick_base_us, args.time_scale),
    )?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let r = Arc::clone(&running);
        let planner = shared.clone();
        ctrlc::set_handler(move || {
            info!("Received shutdown signal, locking planner");
            planner.with(|p| p.lock());
            r.store(false, Ordering::SeqCst);
        })?;
    }

    for (lineno, line) in program.lines().enumerate() {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        if line.trim().is_empty() || line.trim_start().starts_with(';') {
            continue;
        }
        // Flow control: never hand the planner a frame it has no room for.
        while running.load(Ordering::SeqCst)
            && shared.with(|p| !p.is_locked() && p.free_slots() == 0)
        {
            thread::sleep(POLL);
        }
        match shared.with(|p| dispatcher.execute_line(p, line)) {
            Ok(reply @ Reply::Planned(_)) => debug!("{reply}"),
            Ok(reply) => info!("{reply}"),
            Err(e) => warn!(line = lineno + 1, "error N{}: {e}", e.id().unwrap_or(-1)),
        }
    }

    while running.load(Ordering::SeqCst) && shared.with(|p| p.used_count() > 0) {
        thread::sleep(POLL);
    }
    runtime.shutdown();

    let (pos, locked) = shared.with(|p| (p.position().pos, p.is_locked()));
    info!(x = pos[0], y = pos[1], z = pos[2], locked, "final position");
    Ok(())
}

/// Setup tracing subscriber from CLI arguments and the configured level.
fn setup_tracing(args: &Args, level: Option<LogLevel>) {
    let directive = if args.verbose {
        LogLevel::Debug.as_directive()
    } else {
        level.unwrap_or_default().as_directive()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
