mod sim;

use std::path::PathBuf;

use clap::Parser;
use embassy_executor::{Executor, Spawner};
use embassy_time::Timer;
use serde::Serialize;
use sr_core::utils::{CycleReport, DistanceSample, Maneuver, Tuning};
use static_cell::StaticCell;
use tracing::{error, info};

use sim::{Board, Odometry};

#[derive(Parser, Debug)]
#[clap(version = "1.0")]
struct Opts {
    /// JSON tuning file; missing fields keep their defaults
    #[clap(long)]
    config: Option<PathBuf>,
    /// override the obstacle threshold (cm)
    #[clap(long)]
    threshold_cm: Option<u16>,
    /// override the avoidance hold (ms)
    #[clap(long)]
    hold_ms: Option<u32>,
    /// scheduler tick between cycles (ms)
    #[clap(long, default_value_t = 50)]
    tick_ms: u64,
    /// number of cycles to run, 0 runs forever
    #[clap(long, default_value_t = 200)]
    cycles: u64,
    /// obstacle distances (cm) revealed one after another as the robot turns away
    #[clap(long, value_delimiter = ',', default_value = "120,45,15,300,8,500")]
    obstacles: Vec<u16>,
    /// print a JSON run summary on exit
    #[clap(long)]
    summary: bool,
}

#[derive(Debug, Default, Serialize)]
struct RunSummary {
    cycles: u64,
    forward_cycles: u64,
    avoid_cycles: u64,
    no_echo_samples: u64,
    sensor_faults: u64,
    drive_faults: u64,
    odometry: Odometry,
}

impl RunSummary {
    fn record(
        &mut self,
        report: &CycleReport,
    ) {
        self.cycles += 1;
        match report.maneuver {
            Maneuver::MoveForward => self.forward_cycles += 1,
            Maneuver::AvoidObstacle => self.avoid_cycles += 1,
        }
        if report.sample == DistanceSample::NoEcho {
            self.no_echo_samples += 1;
        }
        self.sensor_faults += report.sensor_fault.is_some() as u64;
        self.drive_faults += report.drive_fault.is_some() as u64;
    }
}

fn load_tuning(opts: &Opts) -> Result<Tuning, String> {
    let mut tuning = match &opts.config {
        Some(path) => {
            let bytes = std::fs::read(path).map_err(|e| format!("{}: {}", path.display(), e))?;
            Tuning::from_json_slice(&bytes).map_err(|e| format!("{}: {}", path.display(), e))?
        }
        None => Tuning::default(),
    };
    if let Some(cm) = opts.threshold_cm {
        tuning.obstacle_threshold_cm = cm;
    }
    if let Some(ms) = opts.hold_ms {
        tuning.avoid_hold_ms = ms;
    }
    tuning.validate().map_err(|e| e.to_string())
}

#[embassy_executor::task]
async fn control_task(
    opts: Opts,
    tuning: Tuning,
) {
    let board = Board::new(opts.obstacles.clone());
    let mut rover = sim::rover(&board, &tuning);
    let mut summary = RunSummary::default();

    info!(
        budget_ms = tuning.cycle_budget().as_millis(),
        tick_ms = opts.tick_ms,
        "Starting control loop"
    );

    loop {
        let report = rover.step();
        summary.record(&report);
        info!(
            cycle = summary.cycles,
            sample = ?report.sample,
            maneuver = ?report.maneuver,
            range_cm = board.range_cm(),
            "cycle"
        );

        if opts.cycles != 0 && summary.cycles >= opts.cycles {
            break;
        }

        // Free-running tick: wall clock for pacing, virtual time for the robot.
        board.advance(opts.tick_ms * 1_000);
        Timer::after_millis(opts.tick_ms).await;
    }

    if let Err(e) = rover.halt() {
        error!("Failed to stop motors: {:?}", e);
    }
    summary.odometry = board.odometry();
    info!(
        cycles = summary.cycles,
        avoid = summary.avoid_cycles,
        collisions = summary.odometry.collisions,
        "Run finished"
    );
    if opts.summary {
        match serde_json::to_string(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to encode summary: {:?}", e),
        }
    }
    std::process::exit(0);
}

#[embassy_executor::task]
async fn main_task(
    spawner: Spawner,
    opts: Opts,
) {
    let tuning = match load_tuning(&opts) {
        Ok(tuning) => tuning,
        Err(e) => {
            error!("Invalid tuning: {}", e);
            std::process::exit(1);
        }
    };
    info!(?tuning, "Tuning loaded");

    if let Err(e) = spawner.spawn(control_task(opts, tuning)) {
        error!("Failed to spawn control task: {:?}", e);
        std::process::exit(1);
    }
}

static EXECUTOR: StaticCell<Executor> = StaticCell::new();

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let opts = Opts::parse();
    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        if let Err(e) = spawner.spawn(main_task(spawner, opts)) {
            error!("Failed to spawn main task: {:?}", e);
        }
    });
}
