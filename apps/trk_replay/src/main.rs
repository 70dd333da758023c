mod checks;

use checks::run_check;
use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use thiserror::Error;
use trk_clock::AcquisitionClock;
use trk_collect::{read_configuration, CollectError, ConfigError, DataCollector, Recording};
use trk_helpers::basic_tracking_setup;
use trk_transform::{TransformError, TransformRepository};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Replays a tracking recording and checks the resolved transforms",
    long_about = None
)]
struct Cli {
    /// Collector configuration file
    #[arg(short, long, default_value = concat!(env!("CARGO_MANIFEST_DIR"), "/data/collector.ron"))]
    config: PathBuf,

    /// Log verbosity, 1 (errors) to 5 (trace)
    #[arg(short, long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(1..=5))]
    verbose: u8,

    /// Dumps the tracked frames between two timestamps
    #[arg(long, num_args = 2, value_names = ["FROM", "TO"])]
    dump: Option<Vec<f64>>,

    /// Time step of the dump, in seconds
    #[arg(long, default_value_t = 0.1, requires = "dump")]
    step: f64,

    /// Saves the dumped frames as a recording (RON for a .ron file, bincode otherwise)
    #[arg(long, requires = "dump")]
    output: Option<PathBuf>,
}

#[derive(Error, Debug)]
enum ReplayError {
    #[error("Failed to set up logging: {0}")]
    Logger(#[from] log::SetLoggerError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Collect(#[from] CollectError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("{0} check(s) failed")]
    ChecksFailed(usize),
}

fn main() {
    if let Err(err) = drive() {
        eprintln!("trk-replay failed: {err}");
        std::process::exit(1);
    }
}

fn drive() -> Result<(), ReplayError> {
    let args = Cli::parse();
    let context = basic_tracking_setup(args.verbose)?;
    replay(&args, context.clock.clone())
}

/// Replays the configured sources, runs the checks, then dumps the requested frames.
fn replay(args: &Cli, clock: AcquisitionClock) -> Result<(), ReplayError> {
    let config = read_configuration(&args.config)?;
    let repository = TransformRepository::new();
    repository.read_configuration(&config.coordinate_definitions)?;

    let mut collector = DataCollector::from_config(&config, clock)?;
    collector.connect()?;
    collector.start()?;
    collector.poll()?;

    let mut failures = 0;
    for check in &config.checks {
        if let Err(e) = run_check(&collector, &repository, check) {
            error!("Check of {} at {} s failed: {e}", check.name(), check.timestamp);
            failures += 1;
        }
    }
    info!(
        "{} of {} check(s) passed",
        config.checks.len() - failures,
        config.checks.len()
    );

    if let Some(range) = &args.dump {
        let frames = collector.get_tracked_frame_list(range[0], range[1], args.step)?;
        for frame in &frames {
            let entries: Vec<String> = frame
                .entries
                .iter()
                .map(|(channel, entry)| {
                    let translation = entry
                        .sample
                        .pose
                        .map(|pose| pose.translation().to_array());
                    format!("{channel} {translation:?} valid={}", entry.sample.valid)
                })
                .collect();
            println!("{:.3}: {}", frame.timestamp, entries.join(", "));
        }
        if let Some(output) = &args.output {
            Recording::from_tracked_frames(&frames).save(output)?;
            info!("Saved {} frame(s) to {}", frames.len(), output.display());
        }
    }

    collector.stop()?;
    collector.disconnect()?;

    if failures > 0 {
        return Err(ReplayError::ChecksFailed(failures));
    }
    Ok(())
}
