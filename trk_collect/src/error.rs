use crate::collector::CollectorState;
use crate::frame::ChannelDiagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Errors of a single frame buffer operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BufferError {
    #[error("Sample at {timestamp} s is older than the last inserted sample at {last} s")]
    OutOfOrderSample { timestamp: f64, last: f64 },

    #[error("Buffer is empty")]
    BufferEmpty,

    #[error("Timestamp {timestamp} s is outside the buffered range [{oldest}, {newest}] s")]
    TimestampOutOfRange {
        timestamp: f64,
        oldest: f64,
        newest: f64,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path:?}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Syntax error in configuration: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] ron::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum CollectError {
    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error("Data collection is not started (state: {0})")]
    NotCollecting(CollectorState),

    #[error("No channel could provide data at {timestamp} s")]
    AllSourcesFailed {
        timestamp: f64,
        diagnostics: Vec<ChannelDiagnostic>,
    },

    #[error("Invalid collector state transition from {from} to {to}")]
    InvalidStateTransition {
        from: CollectorState,
        to: CollectorState,
    },

    #[error("Sources can only be added while disconnected (state: {0})")]
    SourcesLocked(CollectorState),

    #[error("Unknown channel '{0}'")]
    UnknownChannel(String),

    #[error("Data source '{source_id}' failed: {message}")]
    Source { source_id: String, message: String },

    #[error("Image of {width}x{height} needs {expected} bytes, got {actual}")]
    InvalidImage {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid time step {0} s")]
    InvalidStep(f64),

    #[error("Invalid time range [{from}, {to}] s")]
    InvalidRange { from: f64, to: f64 },

    #[error("Frame list of {requested} frames exceeds the limit of {limit}")]
    FrameListTooLong { requested: f64, limit: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Recording error: {0}")]
    Recording(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CollectError {
    pub fn source_failure(source_id: &str, message: impl Into<String>) -> Self {
        Self::Source {
            source_id: source_id.to_string(),
            message: message.into(),
        }
    }
}

pub type CollectResult<T> = Result<T, CollectError>;
