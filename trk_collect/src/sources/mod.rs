mod replay;
mod simulated;

pub use replay::ReplaySource;
pub use simulated::SimulatedTracker;

use crate::config::{SourceConfig, SourceKind};
use crate::source::DataSource;

/// Instantiates the source described by a configuration entry.
pub fn build_source(config: &SourceConfig) -> Box<dyn DataSource> {
    match &config.kind {
        SourceKind::Replay { path, mode } => {
            Box::new(ReplaySource::new(config.id.clone(), path.clone(), *mode))
        }
        SourceKind::Simulated { tools } => {
            Box::new(SimulatedTracker::new(config.id.clone(), tools.clone()))
        }
    }
}
