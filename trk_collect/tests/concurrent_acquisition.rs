use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use trk_clock::AcquisitionClock;
use trk_collect::prelude::*;

const CONFIG: &str = r#"(
    tolerance_s: 0.05,
    sources: [
        (
            id: "sim",
            kind: Simulated(tools: [
                (channel: "ProbeToTracker", center: (0.0, 0.0, -1500.0), radius: 40.0, period_s: 2.0),
                (channel: "StylusToTracker", radius: 10.0, period_s: 1.0, visible: false),
            ]),
            acquisition_rate_hz: 250.0,
            channels: [
                (id: "ProbeToTracker", transform: (from: "Probe", to: "Tracker"), capacity: 50),
                (id: "StylusToTracker", transform: (from: "Stylus", to: "Tracker"), capacity: 50),
            ],
        ),
    ],
)"#;

fn wait_for(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn frames_are_read_while_sources_write() {
    let config = CollectorConfig::deserialize_ron(CONFIG).unwrap();
    let mut collector = DataCollector::from_config(&config, AcquisitionClock::new()).unwrap();
    collector.connect().unwrap();
    collector.start().unwrap();

    let probe = collector.buffer("ProbeToTracker").unwrap();
    wait_for(|| probe.len() >= 20);
    assert!(probe.len() >= 20);

    let repository = Arc::new(TransformRepository::new());
    let mut readers = Vec::new();
    for _ in 0..4 {
        let repository = repository.clone();
        let probe = probe.clone();
        readers.push(thread::spawn(move || {
            let mut checked = 0;
            for _ in 0..200 {
                if let Some((oldest, newest)) = probe.time_range() {
                    assert!(oldest <= newest);
                    let sample = probe.get_by_time((oldest + newest) / 2.0, true).unwrap();
                    assert!(sample.valid);
                    checked += 1;
                }
                let _ = repository.get_transform(&TransformName::new("Probe", "Tracker"));
            }
            checked
        }));
    }

    for _ in 0..50 {
        if let Some(timestamp) = collector.most_recent_timestamp() {
            let frame = collector.get_tracked_frame_by_time(timestamp).unwrap();
            repository.set_transforms(&frame).unwrap();
        }
        thread::sleep(Duration::from_millis(1));
    }

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }

    let (probe_to_tracker, valid) = repository
        .get_transform(&TransformName::new("Probe", "Tracker"))
        .unwrap();
    assert!(valid);
    let translation = probe_to_tracker.translation();
    assert!((translation.x.hypot(translation.y) - 40.0).abs() < 1e-6);
    let (_, stylus_valid) = repository
        .get_transform(&TransformName::new("Stylus", "Tracker"))
        .unwrap();
    assert!(!stylus_valid);

    collector.disconnect().unwrap();
    assert!(probe.is_empty());
}
