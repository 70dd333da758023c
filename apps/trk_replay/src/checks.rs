use log::{debug, info};
use thiserror::Error;
use trk_collect::config::TransformCheck;
use trk_collect::{CollectError, DataCollector};
use trk_transform::{TransformError, TransformName, TransformRepository};

#[derive(Error, Debug)]
pub enum CheckFailure {
    #[error(transparent)]
    Collect(#[from] CollectError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("{name} validity is {actual}, expected {expected}")]
    Validity {
        name: TransformName,
        expected: bool,
        actual: bool,
    },

    #[error("{name} translation {actual:?} is further than {tolerance} from {expected:?}")]
    Translation {
        name: TransformName,
        expected: (f64, f64, f64),
        actual: (f64, f64, f64),
        tolerance: f64,
    },
}

/// Updates the repository with the tracked frame at the check time, then compares the
/// resolved transform with the expectation.
pub fn run_check(
    collector: &DataCollector,
    repository: &TransformRepository,
    check: &TransformCheck,
) -> Result<(), CheckFailure> {
    let frame = collector.get_tracked_frame_by_time(check.timestamp)?;
    for diagnostic in &frame.diagnostics {
        debug!(
            "Channel {} missing at {} s: {}",
            diagnostic.channel, check.timestamp, diagnostic.error
        );
    }
    // an edge the repository refuses does not necessarily affect the checked transform
    if let Err(e) = repository.set_transforms(&frame) {
        debug!("Partial repository update at {} s: {e}", check.timestamp);
    }

    let name = check.name();
    let (matrix, valid) = repository.get_transform(&name)?;
    if valid != check.valid {
        return Err(CheckFailure::Validity {
            name,
            expected: check.valid,
            actual: valid,
        });
    }

    if let Some(expected) = check.translation {
        let actual = (
            matrix.element(0, 3),
            matrix.element(1, 3),
            matrix.element(2, 3),
        );
        let off = (actual.0 - expected.0).abs() > check.tolerance
            || (actual.1 - expected.1).abs() > check.tolerance
            || (actual.2 - expected.2).abs() > check.tolerance;
        if off {
            return Err(CheckFailure::Translation {
                name,
                expected,
                actual,
                tolerance: check.tolerance,
            });
        }
    }
    info!("{name} at {} s matches", check.timestamp);
    Ok(())
}
