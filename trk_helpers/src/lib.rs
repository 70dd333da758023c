use log::{info, SetLoggerError};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use trk_clock::{AcquisitionClock, AcquisitionClockMock, ClockProvider};

/// Just a simple struct to hold the various bits needed to run a tracking application.
/// It is passed explicitly to whatever needs the clock instead of living in a global.
#[derive(Clone, Debug)]
pub struct TrackingContext {
    pub clock: AcquisitionClock,
}

impl ClockProvider for TrackingContext {
    fn get_clock(&self) -> AcquisitionClock {
        self.clock.clone()
    }
}

/// Maps a command line verbosity to a log level: 1 is errors only, 5 is everything.
/// 0 turns logging off, anything above 5 is treated as 5.
pub fn level_filter(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// This is a basic setup for a tracking application to get you started.
/// It installs a text logger on the terminal and starts the acquisition clock.
///
/// Fails if a logger is already installed in this process.
pub fn basic_tracking_setup(verbosity: u8) -> Result<TrackingContext, SetLoggerError> {
    TermLogger::init(
        level_filter(verbosity),
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;
    let clock = AcquisitionClock::default();
    info!("Tracking context ready, log level {}", level_filter(verbosity));
    Ok(TrackingContext { clock })
}

/// Same as [`basic_tracking_setup`] without a logger and with a mocked clock, for tests.
pub fn mock_tracking_setup() -> (TrackingContext, AcquisitionClockMock) {
    let (clock, mock) = AcquisitionClock::mock();
    (TrackingContext { clock }, mock)
}
