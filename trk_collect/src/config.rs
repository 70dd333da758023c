//! Collector configuration, read from a RON document.
//!
//! ```ron
//! (
//!     tolerance_s: 0.5,
//!     sources: [
//!         (
//!             id: "tracker",
//!             kind: Replay(path: "recording.ron", mode: Preload),
//!             channels: [
//!                 (id: "ProbeToTracker", transform: (from: "Probe", to: "Tracker")),
//!             ],
//!         ),
//!     ],
//! )
//! ```
use crate::buffer::{DEFAULT_CAPACITY, DEFAULT_TOLERANCE_S};
use crate::error::ConfigError;
use crate::frame::ChannelId;
use ron::extensions::Extensions;
use ron::Options;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use std::time::Duration;
use trk_clock::Timestamp;
use trk_transform::{CoordinateDefinition, FrameId, TransformName};

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE_S
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_true() -> bool {
    true
}

fn default_check_tolerance() -> f64 {
    1e-3
}

/// Time between two acquisitions at `rate_hz`, `None` when the rate is not positive or its
/// period is zero or too long to be represented.
pub fn acquisition_period(rate_hz: f64) -> Option<Duration> {
    if !rate_hz.is_finite() || rate_hz <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(rate_hz.recip())
        .ok()
        .filter(|period| !period.is_zero())
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplayMode {
    /// Every recorded sample is pushed when the source starts.
    #[default]
    Preload,
    /// Samples are pushed as the clock reaches their offset from the first frame.
    RealTime,
}

/// A tool of the simulated tracker, moving on a circle in the XY plane.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulatedToolConfig {
    pub channel: ChannelId,
    #[serde(default)]
    pub center: (f64, f64, f64),
    pub radius: f64,
    pub period_s: f64,
    /// An invisible tool only ever reports invalid samples.
    #[serde(default = "default_true")]
    pub visible: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SourceKind {
    Replay {
        path: PathBuf,
        #[serde(default)]
        mode: ReplayMode,
    },
    Simulated {
        tools: Vec<SimulatedToolConfig>,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub id: ChannelId,
    /// The transform carried by the poses of this channel, if any.
    #[serde(default)]
    pub transform: Option<TransformName>,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_true")]
    pub interpolate: bool,
}

impl ChannelConfig {
    pub fn new(id: impl Into<ChannelId>) -> Self {
        Self {
            id: id.into(),
            transform: None,
            capacity: DEFAULT_CAPACITY,
            interpolate: true,
        }
    }

    pub fn with_transform(mut self, name: TransformName) -> Self {
        self.transform = Some(name);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub kind: SourceKind,
    /// Rate of the acquisition thread. Without it the source is only ticked by `poll`.
    #[serde(default)]
    pub acquisition_rate_hz: Option<f64>,
    pub channels: Vec<ChannelConfig>,
}

/// An expected transform at a given time, verified by the replay tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransformCheck {
    pub timestamp: Timestamp,
    pub from: FrameId,
    pub to: FrameId,
    #[serde(default)]
    pub translation: Option<(f64, f64, f64)>,
    #[serde(default = "default_true")]
    pub valid: bool,
    #[serde(default = "default_check_tolerance")]
    pub tolerance: f64,
}

impl TransformCheck {
    pub fn name(&self) -> TransformName {
        TransformName::new(self.from.clone(), self.to.clone())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfig {
    #[serde(default = "default_tolerance")]
    pub tolerance_s: f64,
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub coordinate_definitions: Vec<CoordinateDefinition>,
    #[serde(default)]
    pub checks: Vec<TransformCheck>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            tolerance_s: DEFAULT_TOLERANCE_S,
            sources: Vec::new(),
            coordinate_definitions: Vec::new(),
            checks: Vec::new(),
        }
    }
}

impl CollectorConfig {
    fn get_options() -> Options {
        Options::default()
            .with_default_extension(Extensions::IMPLICIT_SOME)
            .with_default_extension(Extensions::UNWRAP_NEWTYPES)
            .with_default_extension(Extensions::UNWRAP_VARIANT_NEWTYPES)
    }

    pub fn serialize_ron(&self) -> Result<String, ConfigError> {
        let pretty = ron::ser::PrettyConfig::default();
        Ok(Self::get_options().to_string_pretty(self, pretty)?)
    }

    /// Parses and validates a configuration document.
    pub fn deserialize_ron(ron: &str) -> Result<Self, ConfigError> {
        let config: Self = Self::get_options().from_str(ron)?;
        config.validate()?;
        Ok(config)
    }

    /// Every channel of every source, in declaration order.
    pub fn channels(&self) -> impl Iterator<Item = &ChannelConfig> {
        self.sources.iter().flat_map(|s| s.channels.iter())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.tolerance_s.is_finite() || self.tolerance_s < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "tolerance_s must be a non negative number, got {}",
                self.tolerance_s
            )));
        }

        let mut source_ids = HashSet::new();
        let mut channel_ids = HashSet::new();
        for source in &self.sources {
            if !source_ids.insert(source.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "Duplicate source id '{}'",
                    source.id
                )));
            }
            if let Some(rate) = source.acquisition_rate_hz {
                if acquisition_period(rate).is_none() {
                    return Err(ConfigError::Invalid(format!(
                        "Source '{}' has an unusable acquisition rate {rate} Hz",
                        source.id
                    )));
                }
            }
            if let SourceKind::Simulated { tools } = &source.kind {
                if let Some(tool) = tools.iter().find(|t| !(t.period_s > 0.0)) {
                    return Err(ConfigError::Invalid(format!(
                        "Simulated tool '{}' needs a positive period",
                        tool.channel
                    )));
                }
            }
            for channel in &source.channels {
                if !channel_ids.insert(channel.id.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "Duplicate channel id '{}'",
                        channel.id
                    )));
                }
                if channel.capacity == 0 {
                    return Err(ConfigError::Invalid(format!(
                        "Channel '{}' needs a capacity of at least 1",
                        channel.id
                    )));
                }
                if let Some(name) = &channel.transform {
                    if !name.is_valid() || name.is_identity() {
                        return Err(ConfigError::Invalid(format!(
                            "Channel '{}' carries an invalid transform name '{name}'",
                            channel.id
                        )));
                    }
                }
            }
        }

        if let Some(check) = self
            .checks
            .iter()
            .find(|c| !c.tolerance.is_finite() || c.tolerance < 0.0)
        {
            return Err(ConfigError::Invalid(format!(
                "Check of {} at {} s has a negative tolerance",
                check.name(),
                check.timestamp
            )));
        }
        Ok(())
    }

    /// Makes relative recording paths relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for source in &mut self.sources {
            if let SourceKind::Replay { path, .. } = &mut source.kind {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        }
    }
}

/// Reads a configuration file. Relative recording paths are taken relative to the file.
pub fn read_configuration(config_filename: &Path) -> Result<CollectorConfig, ConfigError> {
    let config_content = read_to_string(config_filename).map_err(|e| ConfigError::Io {
        path: config_filename.to_path_buf(),
        source: e,
    })?;
    let mut config = CollectorConfig::deserialize_ron(&config_content)?;
    if let Some(base) = config_filename.parent() {
        config.resolve_paths(base);
    }
    Ok(config)
}
