use crate::buffer::FrameBuffer;
use crate::config::{acquisition_period, ChannelConfig, CollectorConfig};
use crate::error::{CollectError, CollectResult, ConfigError};
use crate::frame::{ChannelDiagnostic, ChannelId, FrameEntry, TrackedFrame};
use crate::source::{DataSource, SourceOutputs};
use crate::sources::build_source;
use log::{debug, info, warn};
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use trk_clock::{AcquisitionClock, ClockProvider, Timestamp};
use trk_transform::TransformName;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectorState {
    Disconnected,
    Connected,
    Started,
    Stopped,
}

impl Display for CollectorState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CollectorState::Disconnected => "Disconnected",
            CollectorState::Connected => "Connected",
            CollectorState::Started => "Started",
            CollectorState::Stopped => "Stopped",
        };
        write!(f, "{name}")
    }
}

impl CollectorState {
    fn can_become(self, to: CollectorState) -> bool {
        use CollectorState::*;
        matches!(
            (self, to),
            (Disconnected, Connected)
                | (Connected, Started)
                | (Started, Stopped)
                | (Stopped, Started)
                | (Connected, Disconnected)
                | (Stopped, Disconnected)
        )
    }
}

/// Upper bound on the number of frames one [`DataCollector::get_tracked_frame_list`] call
/// gathers.
pub const MAX_FRAME_LIST_LEN: usize = 1_000_000;

type SharedSource = Arc<Mutex<Box<dyn DataSource>>>;

fn lock_source(source: &SharedSource) -> MutexGuard<'_, Box<dyn DataSource>> {
    source.lock().unwrap_or_else(PoisonError::into_inner)
}

struct SourceSlot {
    id: String,
    source: SharedSource,
    acquisition_rate_hz: Option<f64>,
    outputs: SourceOutputs,
}

struct Channel {
    id: ChannelId,
    buffer: FrameBuffer,
    transform: Option<TransformName>,
    interpolate: bool,
}

/// Merges the channels of several data sources into tracked frames.
///
/// Sources are driven through the `Disconnected -> Connected -> Started -> Stopped` lifecycle.
/// A source with an acquisition rate gets its own thread while started; the others are ticked
/// with [`DataCollector::poll`].
pub struct DataCollector {
    clock: AcquisitionClock,
    tolerance: f64,
    state: CollectorState,
    sources: Vec<SourceSlot>,
    channels: Vec<Channel>,
    running: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl DataCollector {
    pub fn new(clock: AcquisitionClock) -> Self {
        Self::with_tolerance(clock, crate::buffer::DEFAULT_TOLERANCE_S)
    }

    /// `tolerance` is the margin, in seconds, granted to lookups outside the buffered spans.
    pub fn with_tolerance(clock: AcquisitionClock, tolerance: f64) -> Self {
        Self {
            clock,
            tolerance,
            state: CollectorState::Disconnected,
            sources: Vec::new(),
            channels: Vec::new(),
            running: Arc::new(AtomicBool::new(false)),
            workers: Vec::new(),
        }
    }

    /// Builds the sources and channels of a configuration.
    pub fn from_config(config: &CollectorConfig, clock: AcquisitionClock) -> CollectResult<Self> {
        config.validate()?;
        let mut collector = Self::with_tolerance(clock, config.tolerance_s);
        for source_config in &config.sources {
            collector.add_source(
                build_source(source_config),
                &source_config.channels,
                source_config.acquisition_rate_hz,
            )?;
        }
        Ok(collector)
    }

    /// Registers a source and the channels it feeds. Only possible while disconnected.
    pub fn add_source(
        &mut self,
        source: Box<dyn DataSource>,
        channels: &[ChannelConfig],
        acquisition_rate_hz: Option<f64>,
    ) -> CollectResult<()> {
        if self.state != CollectorState::Disconnected {
            return Err(CollectError::SourcesLocked(self.state));
        }
        if let Some(rate) = acquisition_rate_hz {
            if acquisition_period(rate).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "Source '{}' has an unusable acquisition rate {rate} Hz",
                    source.id()
                ))
                .into());
            }
        }
        for (i, channel) in channels.iter().enumerate() {
            let duplicate = self.channels.iter().any(|c| c.id == channel.id)
                || channels[..i].iter().any(|c| c.id == channel.id);
            if duplicate {
                return Err(
                    ConfigError::Invalid(format!("Duplicate channel id '{}'", channel.id)).into(),
                );
            }
        }

        let mut outputs = SourceOutputs::new();
        for channel in channels {
            let buffer = FrameBuffer::with_tolerance(channel.capacity, self.tolerance);
            outputs.add_channel(channel.id.clone(), buffer.clone());
            self.channels.push(Channel {
                id: channel.id.clone(),
                buffer,
                transform: channel.transform.clone(),
                interpolate: channel.interpolate,
            });
        }
        debug!(
            "Added source {} with {} channel(s)",
            source.id(),
            channels.len()
        );
        self.sources.push(SourceSlot {
            id: source.id().to_string(),
            source: Arc::new(Mutex::new(source)),
            acquisition_rate_hz,
            outputs,
        });
        Ok(())
    }

    pub fn state(&self) -> CollectorState {
        self.state
    }

    pub fn channel_ids(&self) -> Vec<ChannelId> {
        self.channels.iter().map(|c| c.id.clone()).collect()
    }

    pub fn source_ids(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.id.clone()).collect()
    }

    /// Shared handle on the buffer of a channel.
    pub fn buffer(&self, channel: &str) -> Option<FrameBuffer> {
        self.channels
            .iter()
            .find(|c| c.id == channel)
            .map(|c| c.buffer.clone())
    }

    fn transition(&self, to: CollectorState) -> CollectResult<()> {
        if !self.state.can_become(to) {
            return Err(CollectError::InvalidStateTransition {
                from: self.state,
                to,
            });
        }
        Ok(())
    }

    fn set_state(&mut self, to: CollectorState) {
        info!("Data collector {} -> {}", self.state, to);
        self.state = to;
    }

    /// Connects every source. If one fails, the sources already connected are disconnected
    /// again and the error is returned.
    pub fn connect(&mut self) -> CollectResult<()> {
        self.transition(CollectorState::Connected)?;
        for (index, slot) in self.sources.iter().enumerate() {
            if let Err(e) = lock_source(&slot.source).connect(&slot.outputs) {
                warn!("Source {} failed to connect: {e}", slot.id);
                for connected in &self.sources[..index] {
                    if let Err(e) = lock_source(&connected.source).disconnect() {
                        warn!("Source {} failed to disconnect: {e}", connected.id);
                    }
                }
                return Err(e);
            }
        }
        self.set_state(CollectorState::Connected);
        Ok(())
    }

    /// Starts every source, then the acquisition threads.
    pub fn start(&mut self) -> CollectResult<()> {
        self.transition(CollectorState::Started)?;
        for (index, slot) in self.sources.iter().enumerate() {
            if let Err(e) = lock_source(&slot.source).start(&self.clock) {
                warn!("Source {} failed to start: {e}", slot.id);
                for started in &self.sources[..index] {
                    if let Err(e) = lock_source(&started.source).stop(&self.clock) {
                        warn!("Source {} failed to stop: {e}", started.id);
                    }
                }
                return Err(e);
            }
        }

        self.running = Arc::new(AtomicBool::new(true));
        let mut spawn_error = None;
        for slot in &self.sources {
            if let Some(rate) = slot.acquisition_rate_hz {
                match self.spawn_worker(slot, rate) {
                    Ok(handle) => self.workers.push(handle),
                    Err(e) => {
                        spawn_error = Some(e);
                        break;
                    }
                }
            }
        }
        if let Some(e) = spawn_error {
            self.shutdown_workers();
            for slot in &self.sources {
                if let Err(e) = lock_source(&slot.source).stop(&self.clock) {
                    warn!("Source {} failed to stop: {e}", slot.id);
                }
            }
            return Err(e);
        }
        self.set_state(CollectorState::Started);
        Ok(())
    }

    fn spawn_worker(&self, slot: &SourceSlot, rate: f64) -> CollectResult<JoinHandle<()>> {
        let source = slot.source.clone();
        let running = self.running.clone();
        let clock = self.clock.clone();
        let id = slot.id.clone();
        let period = acquisition_period(rate).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "Source '{id}' has an unusable acquisition rate {rate} Hz"
            ))
        })?;

        let handle = thread::Builder::new()
            .name(format!("acquisition-{id}"))
            .spawn(move || {
                debug!("Acquisition thread for {id} running at {rate} Hz");
                let mut next_tick = Some(Instant::now());
                while running.load(Ordering::Acquire) {
                    if let Err(e) = lock_source(&source).update(&clock) {
                        warn!("Source {id} update failed: {e}");
                    }
                    next_tick = next_tick.and_then(|t| t.checked_add(period));
                    let now = Instant::now();
                    if next_tick.is_some_and(|tick| tick < now) {
                        next_tick = Some(now);
                    }
                    // parked until the next tick, or until unparked by shutdown_workers
                    while running.load(Ordering::Acquire) {
                        let now = Instant::now();
                        match next_tick {
                            Some(tick) if tick <= now => break,
                            Some(tick) => thread::park_timeout(tick - now),
                            None => thread::park(),
                        }
                    }
                }
                debug!("Acquisition thread for {id} stopped");
            })?;
        Ok(handle)
    }

    fn shutdown_workers(&mut self) {
        self.running.store(false, Ordering::Release);
        for handle in self.workers.drain(..) {
            handle.thread().unpark();
            if handle.join().is_err() {
                warn!("An acquisition thread panicked");
            }
        }
    }

    /// Joins the acquisition threads and stops every source. All sources are stopped even if
    /// one fails; the first failure is returned.
    pub fn stop(&mut self) -> CollectResult<()> {
        self.transition(CollectorState::Stopped)?;
        self.shutdown_workers();
        let mut first_error = None;
        for slot in &self.sources {
            if let Err(e) = lock_source(&slot.source).stop(&self.clock) {
                warn!("Source {} failed to stop: {e}", slot.id);
                first_error.get_or_insert(e);
            }
        }
        self.set_state(CollectorState::Stopped);
        first_error.map_or(Ok(()), Err)
    }

    /// Disconnects every source and clears the channel buffers, stopping first if needed.
    pub fn disconnect(&mut self) -> CollectResult<()> {
        let mut first_error = None;
        if self.state == CollectorState::Started {
            if let Err(e) = self.stop() {
                first_error.get_or_insert(e);
            }
        }
        self.transition(CollectorState::Disconnected)?;
        for slot in &self.sources {
            if let Err(e) = lock_source(&slot.source).disconnect() {
                warn!("Source {} failed to disconnect: {e}", slot.id);
                first_error.get_or_insert(e);
            }
        }
        for channel in &self.channels {
            channel.buffer.clear();
        }
        self.set_state(CollectorState::Disconnected);
        first_error.map_or(Ok(()), Err)
    }

    /// Ticks once every source that has no acquisition thread.
    pub fn poll(&mut self) -> CollectResult<()> {
        if self.state != CollectorState::Started {
            return Err(CollectError::NotCollecting(self.state));
        }
        for slot in self
            .sources
            .iter()
            .filter(|s| s.acquisition_rate_hz.is_none())
        {
            lock_source(&slot.source).update(&self.clock)?;
        }
        Ok(())
    }

    /// Gathers the sample of every channel at `timestamp`.
    ///
    /// Channels that cannot answer are left out of the frame and reported in its diagnostics.
    /// Fails only when no channel could answer.
    pub fn get_tracked_frame_by_time(&self, timestamp: Timestamp) -> CollectResult<TrackedFrame> {
        if self.state != CollectorState::Started {
            return Err(CollectError::NotCollecting(self.state));
        }

        let mut frame = TrackedFrame::new(timestamp);
        for channel in &self.channels {
            match channel.buffer.get_by_time(timestamp, channel.interpolate) {
                Ok(sample) => {
                    frame.entries.insert(
                        channel.id.clone(),
                        FrameEntry {
                            sample,
                            transform_name: channel.transform.clone(),
                        },
                    );
                }
                Err(error) => {
                    debug!("Channel {} has no data at {timestamp} s: {error}", channel.id);
                    frame.diagnostics.push(ChannelDiagnostic {
                        channel: channel.id.clone(),
                        error,
                    });
                }
            }
        }

        if frame.entries.is_empty() {
            return Err(CollectError::AllSourcesFailed {
                timestamp,
                diagnostics: frame.diagnostics,
            });
        }
        Ok(frame)
    }

    /// The latest time at which every channel has data, `None` if a channel is still empty.
    pub fn most_recent_timestamp(&self) -> Option<Timestamp> {
        self.channels
            .iter()
            .map(|c| c.buffer.newest_timestamp())
            .try_fold(None, |acc: Option<Timestamp>, newest| {
                let newest = newest?;
                Some(Some(acc.map_or(newest, |acc| acc.min(newest))))
            })
            .flatten()
    }

    /// Oldest and newest buffered timestamps over all channels, widened by the tolerance.
    fn buffered_span(&self) -> Option<(Timestamp, Timestamp)> {
        self.channels
            .iter()
            .filter_map(|c| c.buffer.time_range())
            .reduce(|(lo, hi), (oldest, newest)| (lo.min(oldest), hi.max(newest)))
            .map(|(lo, hi)| (lo - self.tolerance, hi + self.tolerance))
    }

    /// Tracked frames at `from`, `from + step`, ... up to `to`. Timestamps where no channel
    /// answers are skipped.
    ///
    /// Only the grid points inside the buffered span are visited, and at most
    /// [`MAX_FRAME_LIST_LEN`] of them.
    pub fn get_tracked_frame_list(
        &self,
        from: Timestamp,
        to: Timestamp,
        step: f64,
    ) -> CollectResult<Vec<TrackedFrame>> {
        if self.state != CollectorState::Started {
            return Err(CollectError::NotCollecting(self.state));
        }
        if !step.is_finite() || step <= 0.0 {
            return Err(CollectError::InvalidStep(step));
        }
        if !from.is_finite() || !to.is_finite() {
            return Err(CollectError::InvalidRange { from, to });
        }
        if to < from {
            return Ok(Vec::new());
        }
        let Some((oldest, newest)) = self.buffered_span() else {
            return Ok(Vec::new());
        };

        // grid indices i with from + i * step in [max(from, oldest), min(to, newest)],
        // tolerating accumulated rounding at both ends
        let first = ((oldest - from) / step - 1e-6).ceil().max(0.0);
        let last = ((to.min(newest) - from) / step + 1e-6).floor();
        if !(last >= first) {
            return Ok(Vec::new());
        }
        let requested = last - first + 1.0;
        if !(requested <= MAX_FRAME_LIST_LEN as f64) {
            return Err(CollectError::FrameListTooLong {
                requested,
                limit: MAX_FRAME_LIST_LEN,
            });
        }
        // bounded above, so the cast is exact
        let count = requested as usize;

        let frames = (0..count)
            .filter_map(|i| {
                let timestamp = from + (first + i as f64) * step;
                match self.get_tracked_frame_by_time(timestamp) {
                    Ok(frame) => Some(frame),
                    Err(e) => {
                        debug!("Skipping {timestamp} s: {e}");
                        None
                    }
                }
            })
            .collect();
        Ok(frames)
    }
}

impl ClockProvider for DataCollector {
    fn get_clock(&self) -> AcquisitionClock {
        self.clock.clone()
    }
}

impl Drop for DataCollector {
    fn drop(&mut self) {
        self.shutdown_workers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReplayMode;
    use crate::recording::{RecordedEntry, RecordedFrame, Recording};
    use crate::sample::Sample;
    use crate::sources::ReplaySource;
    use approx::assert_relative_eq;
    use std::time::Duration;
    use trk_transform::Transform3D;

    fn recording() -> Recording {
        let frames = (0..10)
            .map(|i| RecordedFrame {
                timestamp: 10.0 + i as f64,
                entries: vec![
                    RecordedEntry {
                        channel: "ProbeToTracker".to_string(),
                        pose: Some(Transform3D::from_translation(i as f64, 0.0, 0.0).to_rows()),
                        valid: true,
                    },
                    RecordedEntry {
                        channel: "StylusToTracker".to_string(),
                        pose: Some(Transform3D::IDENTITY.to_rows()),
                        valid: i < 5,
                    },
                ],
            })
            .collect();
        Recording { frames }
    }

    fn channels() -> Vec<ChannelConfig> {
        vec![
            ChannelConfig::new("ProbeToTracker")
                .with_transform(TransformName::new("Probe", "Tracker")),
            ChannelConfig::new("StylusToTracker")
                .with_transform(TransformName::new("Stylus", "Tracker")),
        ]
    }

    fn collector() -> DataCollector {
        let (clock, _mock) = AcquisitionClock::mock();
        let mut collector = DataCollector::with_tolerance(clock, 0.5);
        collector
            .add_source(
                Box::new(ReplaySource::from_recording(
                    "replay",
                    recording(),
                    ReplayMode::Preload,
                )),
                &channels(),
                None,
            )
            .unwrap();
        collector
    }

    /// A source that records its lifecycle calls.
    struct Scripted {
        id: String,
        fail_connect: bool,
        connected: Arc<AtomicBool>,
        outputs: Option<SourceOutputs>,
        ticks: u32,
    }

    impl Scripted {
        fn new(id: &str, fail_connect: bool) -> (Self, Arc<AtomicBool>) {
            let connected = Arc::new(AtomicBool::new(false));
            (
                Self {
                    id: id.to_string(),
                    fail_connect,
                    connected: connected.clone(),
                    outputs: None,
                    ticks: 0,
                },
                connected,
            )
        }
    }

    impl DataSource for Scripted {
        fn id(&self) -> &str {
            &self.id
        }

        fn connect(&mut self, outputs: &SourceOutputs) -> CollectResult<()> {
            if self.fail_connect {
                return Err(CollectError::source_failure(&self.id, "device unplugged"));
            }
            self.outputs = Some(outputs.clone());
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn disconnect(&mut self) -> CollectResult<()> {
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn update(&mut self, _clock: &AcquisitionClock) -> CollectResult<()> {
            self.ticks += 1;
            if let Some(outputs) = &self.outputs {
                for channel in outputs.channel_ids().cloned().collect::<Vec<_>>() {
                    outputs.push(
                        &channel,
                        Sample::from_pose(self.ticks as f64, Transform3D::IDENTITY, true),
                    )?;
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_state_machine() {
        let mut collector = collector();
        assert_eq!(collector.state(), CollectorState::Disconnected);

        assert!(matches!(
            collector.start(),
            Err(CollectError::InvalidStateTransition {
                from: CollectorState::Disconnected,
                to: CollectorState::Started
            })
        ));
        assert!(collector.stop().is_err());
        assert!(collector.disconnect().is_err());

        collector.connect().unwrap();
        assert!(collector.connect().is_err());
        collector.start().unwrap();
        assert_eq!(collector.state(), CollectorState::Started);
        collector.stop().unwrap();
        collector.start().unwrap();

        // disconnect from started stops first
        collector.disconnect().unwrap();
        assert_eq!(collector.state(), CollectorState::Disconnected);
        assert!(collector.buffer("ProbeToTracker").unwrap().is_empty());
    }

    #[test]
    fn test_sources_locked_once_connected() {
        let mut collector = collector();
        collector.connect().unwrap();
        let (source, _) = Scripted::new("late", false);
        assert!(matches!(
            collector.add_source(Box::new(source), &[], None),
            Err(CollectError::SourcesLocked(CollectorState::Connected))
        ));
    }

    #[test]
    fn test_duplicate_channel_rejected() {
        let mut collector = collector();
        let (source, _) = Scripted::new("dup", false);
        assert!(matches!(
            collector.add_source(Box::new(source), &[ChannelConfig::new("ProbeToTracker")], None),
            Err(CollectError::Config(ConfigError::Invalid(_)))
        ));
    }

    #[test]
    fn test_connect_rolls_back() {
        let (clock, _mock) = AcquisitionClock::mock();
        let mut collector = DataCollector::new(clock);
        let (good, good_connected) = Scripted::new("good", false);
        let (bad, _) = Scripted::new("bad", true);
        collector
            .add_source(Box::new(good), &[ChannelConfig::new("A")], None)
            .unwrap();
        collector
            .add_source(Box::new(bad), &[ChannelConfig::new("B")], None)
            .unwrap();

        let err = collector.connect().unwrap_err();
        assert!(matches!(err, CollectError::Source { ref source_id, .. } if source_id == "bad"));
        assert_eq!(collector.state(), CollectorState::Disconnected);
        assert!(!good_connected.load(Ordering::SeqCst));
    }

    #[test]
    fn test_tracked_frame_requires_started() {
        let mut collector = collector();
        assert!(matches!(
            collector.get_tracked_frame_by_time(10.0),
            Err(CollectError::NotCollecting(CollectorState::Disconnected))
        ));
        collector.connect().unwrap();
        assert!(matches!(
            collector.get_tracked_frame_by_time(10.0),
            Err(CollectError::NotCollecting(CollectorState::Connected))
        ));
        assert!(matches!(collector.poll(), Err(CollectError::NotCollecting(_))));
    }

    #[test]
    fn test_tracked_frame_by_time() {
        let mut collector = collector();
        collector.connect().unwrap();
        collector.start().unwrap();

        let frame = collector.get_tracked_frame_by_time(12.5).unwrap();
        assert_eq!(frame.timestamp, 12.5);
        assert_eq!(frame.len(), 2);
        assert!(frame.diagnostics.is_empty());
        let probe = frame.entry("ProbeToTracker").unwrap();
        assert_relative_eq!(probe.sample.pose.unwrap().translation().x, 2.5, epsilon = 1e-9);
        assert_eq!(
            probe.transform_name,
            Some(TransformName::new("Probe", "Tracker"))
        );

        let stylus = frame.entry("StylusToTracker").unwrap();
        assert_eq!(stylus.sample.timestamp, 12.5);
        assert!(stylus.sample.valid);

        // invalid neighbour: nearest sample, tie to the later one
        let frame = collector.get_tracked_frame_by_time(14.5).unwrap();
        let stylus = frame.entry("StylusToTracker").unwrap();
        assert_eq!(stylus.sample.timestamp, 15.0);
        assert!(!stylus.sample.valid);
    }

    #[test]
    fn test_partial_and_total_failures() {
        let (clock, _mock) = AcquisitionClock::mock();
        let mut collector = DataCollector::with_tolerance(clock, 0.5);
        collector
            .add_source(
                Box::new(ReplaySource::from_recording(
                    "replay",
                    recording(),
                    ReplayMode::Preload,
                )),
                &[
                    ChannelConfig::new("ProbeToTracker"),
                    ChannelConfig::new("ReferenceToTracker"),
                ],
                None,
            )
            .unwrap();
        collector.connect().unwrap();
        collector.start().unwrap();

        let frame = collector.get_tracked_frame_by_time(11.0).unwrap();
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.diagnostics.len(), 1);
        assert_eq!(frame.diagnostics[0].channel, "ReferenceToTracker");
        assert_eq!(
            frame.diagnostics[0].error,
            crate::error::BufferError::BufferEmpty
        );

        match collector.get_tracked_frame_by_time(100.0) {
            Err(CollectError::AllSourcesFailed {
                timestamp,
                diagnostics,
            }) => {
                assert_eq!(timestamp, 100.0);
                assert_eq!(diagnostics.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_zero_channels_fail() {
        let (clock, _mock) = AcquisitionClock::mock();
        let mut collector = DataCollector::new(clock);
        collector.connect().unwrap();
        collector.start().unwrap();
        assert!(matches!(
            collector.get_tracked_frame_by_time(1.0),
            Err(CollectError::AllSourcesFailed { .. })
        ));
        assert_eq!(collector.most_recent_timestamp(), None);
    }

    #[test]
    fn test_most_recent_timestamp_and_list() {
        let (clock, _mock) = AcquisitionClock::mock();
        let mut collector = DataCollector::new(clock);
        let (scripted, _) = Scripted::new("ticker", false);
        collector
            .add_source(Box::new(scripted), &[ChannelConfig::new("Tick")], None)
            .unwrap();
        collector
            .add_source(
                Box::new(ReplaySource::from_recording(
                    "replay",
                    recording(),
                    ReplayMode::Preload,
                )),
                &[ChannelConfig::new("ProbeToTracker")],
                None,
            )
            .unwrap();
        collector.connect().unwrap();
        collector.start().unwrap();
        assert_eq!(collector.most_recent_timestamp(), None);

        for _ in 0..3 {
            collector.poll().unwrap();
        }
        // Tick newest is 3, ProbeToTracker newest is 19
        assert_eq!(collector.most_recent_timestamp(), Some(3.0));

        let frames = collector.get_tracked_frame_list(10.0, 12.0, 0.5).unwrap();
        assert_eq!(frames.len(), 5);
        assert_eq!(frames[4].timestamp, 12.0);
        assert!(matches!(
            collector.get_tracked_frame_list(10.0, 12.0, 0.0),
            Err(CollectError::InvalidStep(_))
        ));
        assert!(collector
            .get_tracked_frame_list(12.0, 10.0, 1.0)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_acquisition_thread() {
        let clock = AcquisitionClock::new();
        let mut collector = DataCollector::new(clock);
        let (scripted, _) = Scripted::new("threaded", false);
        collector
            .add_source(
                Box::new(scripted),
                &[ChannelConfig::new("Tick")],
                Some(200.0),
            )
            .unwrap();
        collector.connect().unwrap();
        collector.start().unwrap();

        let buffer = collector.buffer("Tick").unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while buffer.len() < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(buffer.len() >= 3);

        // no tick once stopped
        collector.stop().unwrap();
        let count = buffer.len();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(buffer.len(), count);
    }

    #[test]
    fn test_frame_list_is_bounded() {
        let mut collector = collector();
        collector.connect().unwrap();
        collector.start().unwrap();

        assert!(matches!(
            collector.get_tracked_frame_list(0.0, f64::INFINITY, 1.0),
            Err(CollectError::InvalidRange { .. })
        ));
        assert!(matches!(
            collector.get_tracked_frame_list(f64::NAN, 12.0, 1.0),
            Err(CollectError::InvalidRange { .. })
        ));

        // only the grid points near buffered data are visited
        let frames = collector.get_tracked_frame_list(-1e12, 1e12, 1.0).unwrap();
        assert_eq!(frames.len(), 10);
        assert_eq!(frames[0].timestamp, 10.0);
        assert_eq!(frames[9].timestamp, 19.0);

        assert!(matches!(
            collector.get_tracked_frame_list(10.0, 19.0, 1e-9),
            Err(CollectError::FrameListTooLong {
                limit: MAX_FRAME_LIST_LEN,
                ..
            })
        ));
    }

    #[test]
    fn test_frame_list_without_data() {
        let (clock, _mock) = AcquisitionClock::mock();
        let mut collector = DataCollector::new(clock);
        let (scripted, _) = Scripted::new("idle", false);
        collector
            .add_source(Box::new(scripted), &[ChannelConfig::new("Tick")], None)
            .unwrap();
        collector.connect().unwrap();
        collector.start().unwrap();
        assert!(collector
            .get_tracked_frame_list(-1e300, 1e300, 1e-300)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_unusable_acquisition_rate() {
        let (clock, _mock) = AcquisitionClock::mock();
        let mut collector = DataCollector::new(clock);
        for rate in [0.0, -1.0, f64::NAN, 1e-30] {
            let (scripted, _) = Scripted::new("slow", false);
            assert!(matches!(
                collector.add_source(Box::new(scripted), &[], Some(rate)),
                Err(CollectError::Config(ConfigError::Invalid(_)))
            ));
        }
        assert!(collector.source_ids().is_empty());
    }

    #[test]
    fn test_slow_acquisition_stops_promptly() {
        let mut collector = DataCollector::new(AcquisitionClock::new());
        let (scripted, _) = Scripted::new("slow", false);
        collector
            .add_source(Box::new(scripted), &[ChannelConfig::new("Tick")], Some(0.01))
            .unwrap();
        collector.connect().unwrap();
        collector.start().unwrap();

        // the first tick is immediate, the next one 100 s later
        let buffer = collector.buffer("Tick").unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while buffer.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(buffer.len(), 1);

        let stopping = Instant::now();
        collector.stop().unwrap();
        assert!(stopping.elapsed() < Duration::from_secs(2));

        collector.start().unwrap();
        let dropping = Instant::now();
        drop(collector);
        assert!(dropping.elapsed() < Duration::from_secs(2));
    }
}
