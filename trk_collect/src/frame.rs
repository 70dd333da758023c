use crate::error::BufferError;
use crate::sample::Sample;
use compact_str::CompactString;
use std::collections::BTreeMap;
use trk_clock::Timestamp;
use trk_transform::{NamedTransform, NamedTransforms, TransformName};

/// Channel identifier strings
pub type ChannelId = CompactString;

/// The sample a channel contributed to a tracked frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameEntry {
    pub sample: Sample,
    /// Name of the transform carried by the pose, if the channel is a tool channel.
    pub transform_name: Option<TransformName>,
}

/// Why a channel is absent from a tracked frame.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelDiagnostic {
    pub channel: ChannelId,
    pub error: BufferError,
}

/// Everything known at one instant across all channels of a collector.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackedFrame {
    pub timestamp: Timestamp,
    pub entries: BTreeMap<ChannelId, FrameEntry>,
    pub diagnostics: Vec<ChannelDiagnostic>,
}

impl TrackedFrame {
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            ..Default::default()
        }
    }

    pub fn entry(&self, channel: &str) -> Option<&FrameEntry> {
        self.entries.get(channel)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The pose carried for `name`, with its validity.
    pub fn transform(&self, name: &TransformName) -> Option<NamedTransform> {
        self.transforms().into_iter().find(|t| &t.name == name)
    }

    /// Every pose entry that names a transform, in channel order.
    pub fn transforms(&self) -> Vec<NamedTransform> {
        self.entries
            .values()
            .filter_map(|entry| {
                let name = entry.transform_name.clone()?;
                let matrix = entry.sample.pose?;
                Some(NamedTransform {
                    name,
                    matrix,
                    valid: entry.sample.valid,
                })
            })
            .collect()
    }
}

impl NamedTransforms for TrackedFrame {
    fn named_transforms(&self) -> Vec<NamedTransform> {
        self.transforms()
    }
}
