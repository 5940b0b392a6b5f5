//! Decoded frames and the sources that produce them.

use crate::error::AppError;
use image::{GrayImage, RgbImage};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// A single decoded 3-channel image, consumed by one evaluation pass.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
    captured_at: Option<SystemTime>,
}

impl Frame {
    /// Wrap an RGB image. Zero-sized images are rejected.
    pub fn new(image: RgbImage) -> Result<Self, AppError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(AppError::InvalidFrame(format!(
                "frame has zero dimension: {}x{}",
                image.width(),
                image.height()
            )));
        }
        Ok(Self {
            image,
            captured_at: None,
        })
    }

    /// Load an image file; its modification time becomes the capture time.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let decoded = image::open(path).map_err(|err| {
            AppError::InvalidFrame(format!("could not load image {}: {err}", path.display()))
        })?;
        let captured_at = std::fs::metadata(path)
            .and_then(|metadata| metadata.modified())
            .ok();
        Ok(Self {
            captured_at,
            ..Self::new(decoded.to_rgb8())?
        })
    }

    pub fn with_capture_time(mut self, captured_at: SystemTime) -> Self {
        self.captured_at = Some(captured_at);
        self
    }

    /// When the frame was captured, if the source knows.
    pub fn captured_at(&self) -> Option<SystemTime> {
        self.captured_at
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> FrameDimensions {
        FrameDimensions {
            width: f64::from(self.width()),
            height: f64::from(self.height()),
        }
    }

    pub fn rgb(&self) -> &RgbImage {
        &self.image
    }

    /// Single-channel intensity view.
    pub fn to_gray(&self) -> GrayImage {
        image::imageops::grayscale(&self.image)
    }
}

/// Width/height pair used as the reference for coordinate scaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameDimensions {
    pub width: f64,
    pub height: f64,
}

/// Produces the frame for the next evaluation pass.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Frame, AppError>;
}

/// Re-reads an image file on every pass; an external grabber keeps it fresh.
#[derive(Debug, Clone)]
pub struct ImageFileSource {
    path: PathBuf,
}

impl ImageFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for ImageFileSource {
    fn next_frame(&mut self) -> Result<Frame, AppError> {
        let frame = Frame::open(&self.path)?;
        debug!(
            path = %self.path.display(),
            width = frame.width(),
            height = frame.height(),
            "Frame loaded"
        );
        Ok(frame)
    }
}
