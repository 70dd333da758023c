use crate::sample::Sample;
use trk_clock::Timestamp;

/// Interpolates between two samples straddling `time`.
///
/// The translation is interpolated linearly and the rotation with slerp. The image, if any, is
/// taken from the nearer sample. Returns `None` when interpolation does not apply: a missing
/// pose, an invalid sample, or a time outside `[before.timestamp, after.timestamp]`.
pub fn interpolate_samples(before: &Sample, after: &Sample, time: Timestamp) -> Option<Sample> {
    if !before.valid || !after.valid {
        return None;
    }
    let (before_pose, after_pose) = (before.pose?, after.pose?);

    if time < before.timestamp || time > after.timestamp {
        return None;
    }

    let span = after.timestamp - before.timestamp;
    let ratio = if span > 0.0 {
        (time - before.timestamp) / span
    } else {
        0.0
    };

    let nearer = if ratio < 0.5 { before } else { after };

    Some(Sample {
        timestamp: time,
        valid: true,
        pose: Some(before_pose.interpolate(&after_pose, ratio)),
        image: nearer.image.clone(),
    })
}
