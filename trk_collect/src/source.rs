use crate::buffer::FrameBuffer;
use crate::error::{CollectError, CollectResult};
use crate::frame::ChannelId;
use crate::sample::Sample;
use log::warn;
use std::collections::HashMap;
use trk_clock::AcquisitionClock;

/// The channel buffers a source writes into, handed over at connect time.
///
/// Cloning is cheap and every clone writes into the same buffers.
#[derive(Clone, Debug, Default)]
pub struct SourceOutputs {
    buffers: HashMap<ChannelId, FrameBuffer>,
}

impl SourceOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_channel(&mut self, channel: impl Into<ChannelId>, buffer: FrameBuffer) {
        self.buffers.insert(channel.into(), buffer);
    }

    pub fn has_channel(&self, channel: &str) -> bool {
        self.buffers.contains_key(channel)
    }

    pub fn channel_ids(&self) -> impl Iterator<Item = &ChannelId> {
        self.buffers.keys()
    }

    /// Pushes a sample into a channel buffer.
    ///
    /// A sample the buffer rejects (older than the newest one) is dropped with a warning and
    /// `Ok(false)` is returned. Only an unknown channel is an error.
    pub fn push(&self, channel: &str, sample: Sample) -> CollectResult<bool> {
        let buffer = self
            .buffers
            .get(channel)
            .ok_or_else(|| CollectError::UnknownChannel(channel.to_string()))?;
        match buffer.insert(sample) {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!("Dropped sample on channel {channel}: {e}");
                Ok(false)
            }
        }
    }
}

/// A device feeding timestamped samples into channel buffers.
///
/// The collector drives the lifecycle: `connect`, then any number of `start`, `update`...,
/// `stop` rounds, then `disconnect`. Lifecycle hooks default to doing nothing.
pub trait DataSource: Send {
    fn id(&self) -> &str;

    /// Opens the device and keeps the outputs it will push into.
    fn connect(&mut self, outputs: &SourceOutputs) -> CollectResult<()>;

    fn disconnect(&mut self) -> CollectResult<()> {
        Ok(())
    }

    /// Called when the collection starts. Acquisition begins here.
    fn start(&mut self, _clock: &AcquisitionClock) -> CollectResult<()> {
        Ok(())
    }

    /// Called when the collection stops.
    fn stop(&mut self, _clock: &AcquisitionClock) -> CollectResult<()> {
        Ok(())
    }

    /// One acquisition tick: pushes the samples acquired since the previous tick.
    fn update(&mut self, clock: &AcquisitionClock) -> CollectResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use trk_transform::Transform3D;

    #[test]
    fn test_push_routes_and_drops() {
        let buffer = FrameBuffer::new(10);
        let mut outputs = SourceOutputs::new();
        outputs.add_channel("ProbeToTracker", buffer.clone());

        let sample = Sample::from_pose(2.0, Transform3D::IDENTITY, true);
        assert!(outputs.push("ProbeToTracker", sample).unwrap());

        let older = Sample::from_pose(1.0, Transform3D::IDENTITY, true);
        assert!(!outputs.push("ProbeToTracker", older).unwrap());
        assert_eq!(buffer.len(), 1);

        let err = outputs.push("Nope", Sample::missing(3.0)).unwrap_err();
        assert!(matches!(err, CollectError::UnknownChannel(c) if c == "Nope"));
    }
}
