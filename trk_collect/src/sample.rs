use crate::error::{CollectError, CollectResult};
use std::sync::Arc;
use trk_clock::Timestamp;
use trk_transform::Transform3D;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Gray8,
    Rgb8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 => 3,
        }
    }
}

/// A captured image. The pixel buffer is shared, cloning a frame never copies pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageFrame {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Arc<[u8]>,
}

impl ImageFrame {
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> CollectResult<Self> {
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(CollectError::InvalidImage {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            data: data.into(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// One acquisition of a channel: a pose, an image or both, tagged with its timestamp and a
/// validity flag telling if the measurement was usable at capture time.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub timestamp: Timestamp,
    pub valid: bool,
    pub pose: Option<Transform3D>,
    pub image: Option<ImageFrame>,
}

impl Sample {
    pub fn from_pose(timestamp: Timestamp, pose: Transform3D, valid: bool) -> Self {
        Self {
            timestamp,
            valid,
            pose: Some(pose),
            image: None,
        }
    }

    pub fn from_image(timestamp: Timestamp, image: ImageFrame) -> Self {
        Self {
            timestamp,
            valid: true,
            pose: None,
            image: Some(image),
        }
    }

    /// A tick where the device reported nothing usable.
    pub fn missing(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            valid: false,
            pose: None,
            image: None,
        }
    }
}
