use crate::config::ReplayMode;
use crate::error::{CollectError, CollectResult};
use crate::recording::{RecordedFrame, Recording};
use crate::source::{DataSource, SourceOutputs};
use log::{debug, info, warn};
use std::path::PathBuf;
use trk_clock::{AcquisitionClock, Timestamp};

/// Replays a recording into the channel buffers, keeping the recorded timestamps.
pub struct ReplaySource {
    id: String,
    path: Option<PathBuf>,
    mode: ReplayMode,
    recording: Option<Recording>,
    outputs: Option<SourceOutputs>,
    next_frame: usize,
    /// Clock time matching the first recorded frame.
    replay_origin: Option<Timestamp>,
}

impl ReplaySource {
    /// A source reading its recording from `path` at connect time.
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>, mode: ReplayMode) -> Self {
        Self {
            id: id.into(),
            path: Some(path.into()),
            mode,
            recording: None,
            outputs: None,
            next_frame: 0,
            replay_origin: None,
        }
    }

    /// A source replaying an in-memory recording.
    pub fn from_recording(id: impl Into<String>, recording: Recording, mode: ReplayMode) -> Self {
        Self {
            id: id.into(),
            path: None,
            mode,
            recording: Some(recording),
            outputs: None,
            next_frame: 0,
            replay_origin: None,
        }
    }

    pub fn mode(&self) -> ReplayMode {
        self.mode
    }

    /// Number of recorded frames not pushed yet.
    pub fn remaining_frames(&self) -> usize {
        self.recording
            .as_ref()
            .map_or(0, |r| r.frames.len().saturating_sub(self.next_frame))
    }

    fn push_frame(outputs: &SourceOutputs, frame: &RecordedFrame) -> CollectResult<()> {
        for entry in frame
            .entries
            .iter()
            .filter(|e| outputs.has_channel(&e.channel))
        {
            outputs.push(&entry.channel, entry.to_sample(frame.timestamp))?;
        }
        Ok(())
    }

    /// Pushes the frames whose offset from the first frame is at most `elapsed` seconds.
    fn push_until(&mut self, elapsed: Option<Timestamp>) -> CollectResult<()> {
        let (Some(recording), Some(outputs)) = (&self.recording, &self.outputs) else {
            return Err(CollectError::source_failure(&self.id, "not connected"));
        };
        let first = recording.first_timestamp().unwrap_or_default();
        while let Some(frame) = recording.frames.get(self.next_frame) {
            if elapsed.is_some_and(|elapsed| frame.timestamp - first > elapsed) {
                break;
            }
            Self::push_frame(outputs, frame)?;
            self.next_frame += 1;
        }
        Ok(())
    }
}

impl DataSource for ReplaySource {
    fn id(&self) -> &str {
        &self.id
    }

    fn connect(&mut self, outputs: &SourceOutputs) -> CollectResult<()> {
        if let Some(path) = &self.path {
            info!("Replay source {} loading {}", self.id, path.display());
            self.recording = Some(Recording::load(path)?);
        }
        let recording = self
            .recording
            .as_ref()
            .ok_or_else(|| CollectError::source_failure(&self.id, "no recording to replay"))?;

        for channel in recording.channels() {
            if !outputs.has_channel(&channel) {
                warn!(
                    "Replay source {}: recorded channel {channel} is not configured, ignored",
                    self.id
                );
            }
        }
        debug!(
            "Replay source {} connected with {} frames",
            self.id,
            recording.frames.len()
        );
        self.outputs = Some(outputs.clone());
        self.next_frame = 0;
        Ok(())
    }

    fn disconnect(&mut self) -> CollectResult<()> {
        self.outputs = None;
        self.next_frame = 0;
        self.replay_origin = None;
        if self.path.is_some() {
            self.recording = None;
        }
        Ok(())
    }

    fn start(&mut self, clock: &AcquisitionClock) -> CollectResult<()> {
        match self.mode {
            ReplayMode::Preload => self.push_until(None),
            ReplayMode::RealTime => {
                // a restart resumes from the next frame
                let resumed_offset = self
                    .recording
                    .as_ref()
                    .and_then(|r| {
                        let first = r.first_timestamp()?;
                        Some(r.frames.get(self.next_frame)?.timestamp - first)
                    })
                    .unwrap_or_default();
                self.replay_origin = Some(clock.now() - resumed_offset);
                self.push_until(Some(resumed_offset))
            }
        }
    }

    fn stop(&mut self, _clock: &AcquisitionClock) -> CollectResult<()> {
        self.replay_origin = None;
        Ok(())
    }

    fn update(&mut self, clock: &AcquisitionClock) -> CollectResult<()> {
        match (self.mode, self.replay_origin) {
            (ReplayMode::RealTime, Some(origin)) => self.push_until(Some(clock.now() - origin)),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::FrameBuffer;
    use crate::recording::RecordedEntry;
    use trk_transform::Transform3D;

    fn recording() -> Recording {
        let frames = (0..5)
            .map(|i| RecordedFrame {
                timestamp: 100.0 + i as f64 * 0.1,
                entries: vec![
                    RecordedEntry {
                        channel: "ProbeToTracker".to_string(),
                        pose: Some(Transform3D::from_translation(i as f64, 0.0, 0.0).to_rows()),
                        valid: true,
                    },
                    RecordedEntry {
                        channel: "Unused".to_string(),
                        pose: None,
                        valid: false,
                    },
                ],
            })
            .collect();
        Recording { frames }
    }

    fn outputs() -> (SourceOutputs, FrameBuffer) {
        let buffer = FrameBuffer::new(10);
        let mut outputs = SourceOutputs::new();
        outputs.add_channel("ProbeToTracker", buffer.clone());
        (outputs, buffer)
    }

    #[test]
    fn test_preload() {
        let (clock, _mock) = AcquisitionClock::mock();
        let (outputs, buffer) = outputs();
        let mut source = ReplaySource::from_recording("replay", recording(), ReplayMode::Preload);
        source.connect(&outputs).unwrap();
        assert!(buffer.is_empty());

        source.start(&clock).unwrap();
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.time_range(), Some((100.0, 100.4)));
        assert_eq!(source.remaining_frames(), 0);

        source.update(&clock).unwrap();
        assert_eq!(buffer.len(), 5);
    }

    #[test]
    fn test_real_time() {
        let (clock, mock) = AcquisitionClock::mock();
        mock.set_value(10.0);
        let (outputs, buffer) = outputs();
        let mut source = ReplaySource::from_recording("replay", recording(), ReplayMode::RealTime);
        source.connect(&outputs).unwrap();
        source.start(&clock).unwrap();
        assert_eq!(buffer.len(), 1);

        mock.advance(0.15);
        source.update(&clock).unwrap();
        assert_eq!(buffer.len(), 2);

        source.stop(&clock).unwrap();
        mock.advance(10.0);
        source.update(&clock).unwrap();
        assert_eq!(buffer.len(), 2);

        // restarting resumes at the next frame
        source.start(&clock).unwrap();
        assert_eq!(buffer.len(), 3);
        mock.advance(0.25);
        source.update(&clock).unwrap();
        assert_eq!(buffer.len(), 5);
    }

    #[test]
    fn test_not_connected() {
        let (clock, _mock) = AcquisitionClock::mock();
        let mut source = ReplaySource::from_recording("replay", recording(), ReplayMode::Preload);
        assert!(matches!(
            source.start(&clock),
            Err(CollectError::Source { .. })
        ));

        let (outputs, _buffer) = outputs();
        let mut source = ReplaySource::new("replay", "/does/not/exist.ron", ReplayMode::Preload);
        assert!(source.connect(&outputs).is_err());
    }
}
