use crate::error::{CollectError, CollectResult};
use crate::frame::TrackedFrame;
use crate::sample::Sample;
use bincode::config::standard;
use bincode::{decode_from_std_read, encode_into_std_write, Decode, Encode};
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use trk_clock::Timestamp;
use trk_transform::Transform3D;

/// One channel measurement in a recording. The pose is a row-major 4x4 matrix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct RecordedEntry {
    pub channel: String,
    #[serde(default)]
    pub pose: Option<[[f64; 4]; 4]>,
    pub valid: bool,
}

impl RecordedEntry {
    pub fn to_sample(&self, timestamp: Timestamp) -> Sample {
        Sample {
            timestamp,
            valid: self.valid,
            pose: self.pose.map(Transform3D::from_rows),
            image: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct RecordedFrame {
    pub timestamp: Timestamp,
    pub entries: Vec<RecordedEntry>,
}

/// A sequence of frames captured from a tracker, in time order.
///
/// Stored as RON when the file extension is `.ron`, as bincode otherwise.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Recording {
    pub frames: Vec<RecordedFrame>,
}

fn is_ron(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("ron"))
}

impl Recording {
    /// Builds a recording out of collected frames. Images are not recorded.
    pub fn from_tracked_frames(frames: &[TrackedFrame]) -> Self {
        let frames = frames
            .iter()
            .map(|frame| RecordedFrame {
                timestamp: frame.timestamp,
                entries: frame
                    .entries
                    .iter()
                    .map(|(channel, entry)| RecordedEntry {
                        channel: channel.to_string(),
                        pose: entry.sample.pose.map(|pose| pose.to_rows()),
                        valid: entry.sample.valid,
                    })
                    .collect(),
            })
            .collect();
        Self { frames }
    }

    /// Channels appearing anywhere in the recording, sorted.
    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self
            .frames
            .iter()
            .flat_map(|f| f.entries.iter().map(|e| e.channel.clone()))
            .collect();
        channels.sort();
        channels.dedup();
        channels
    }

    pub fn first_timestamp(&self) -> Option<Timestamp> {
        self.frames.first().map(|f| f.timestamp)
    }

    pub fn load(path: &Path) -> CollectResult<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        if is_ron(path) {
            ron::de::from_reader(reader)
                .map_err(|e| CollectError::Recording(format!("{}: {e}", path.display())))
        } else {
            decode_from_std_read(&mut reader, standard())
                .map_err(|e| CollectError::Recording(format!("{}: {e}", path.display())))
        }
    }

    pub fn save(&self, path: &Path) -> CollectResult<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        if is_ron(path) {
            let text = ron::ser::to_string_pretty(self, PrettyConfig::default())
                .map_err(|e| CollectError::Recording(e.to_string()))?;
            writer.write_all(text.as_bytes())?;
        } else {
            encode_into_std_write(self, &mut writer, standard())
                .map_err(|e| CollectError::Recording(e.to_string()))?;
        }
        writer.flush()?;
        Ok(())
    }
}
