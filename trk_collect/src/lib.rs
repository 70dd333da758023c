//! Acquisition side of tracked imaging.
//!
//! Every channel of a device keeps its recent [`Sample`]s in a [`FrameBuffer`]. A
//! [`DataCollector`] drives the [`DataSource`]s feeding those buffers and assembles, for any
//! requested time, a [`TrackedFrame`] holding the sample of every channel at that time.
pub mod buffer;
pub mod collector;
pub mod config;
pub mod error;
pub mod frame;
pub mod interpolation;
pub mod recording;
pub mod sample;
pub mod source;
pub mod sources;

pub use buffer::FrameBuffer;
pub use collector::{CollectorState, DataCollector};
pub use config::{read_configuration, CollectorConfig};
pub use error::{BufferError, CollectError, CollectResult, ConfigError};
pub use frame::{ChannelDiagnostic, ChannelId, FrameEntry, TrackedFrame};
pub use recording::Recording;
pub use sample::{ImageFrame, PixelFormat, Sample};
pub use source::{DataSource, SourceOutputs};

pub mod prelude {
    pub use crate::buffer::FrameBuffer;
    pub use crate::collector::{CollectorState, DataCollector};
    pub use crate::config::*;
    pub use crate::error::*;
    pub use crate::frame::*;
    pub use crate::recording::*;
    pub use crate::sample::*;
    pub use crate::source::*;
    pub use crate::sources::*;
    pub use trk_clock::{AcquisitionClock, ClockProvider, Timestamp};
    pub use trk_transform::{
        CoordinateDefinition, NamedTransforms, Transform3D, TransformError, TransformName,
        TransformRepository, TransformResult,
    };
}
