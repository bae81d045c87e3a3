//! Frame type and pixel conversion: YUYV and NV21 luma extraction, rotation.

use image::{DynamicImage, GrayImage, RgbaImage};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid {format:?} buffer length: expected {expected}, got {actual}")]
    InvalidLength {
        format: PixelFormat,
        expected: usize,
        actual: usize,
    },
    #[error("unsupported rotation: {0} degrees (need 0, 90, 180 or 270)")]
    InvalidRotation(u32),
}

/// Pixel layout of a frame buffer as delivered by the capture pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit grayscale (1 byte/pixel).
    Gray,
    /// NV21 / YUV 4:2:0 semi-planar: a full Y plane followed by interleaved VU.
    Nv21,
    /// YUYV 4:2:2 packed (2 bytes/pixel, extract Y channel).
    Yuyv,
    /// 8-bit RGBA (4 bytes/pixel).
    Rgba,
}

type ReleaseFn = Box<dyn FnOnce() + Send + 'static>;

/// A captured camera frame.
///
/// The release callback hands the buffer back to the capture pipeline. It runs
/// exactly once, when the frame is dropped, whichever path the frame took.
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Clockwise rotation needed to make the frame upright.
    pub rotation: u32,
    pub format: PixelFormat,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
    release: Option<ReleaseFn>,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            data,
            width,
            height,
            rotation: 0,
            format,
            timestamp: std::time::Instant::now(),
            sequence: 0,
            release: None,
        }
    }

    pub fn with_rotation(mut self, degrees: u32) -> Self {
        self.rotation = degrees;
        self
    }

    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    /// Register the callback that returns the buffer to the capture pipeline.
    pub fn on_release(mut self, release: impl FnOnce() + Send + 'static) -> Self {
        self.release = Some(Box::new(release));
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Release the frame now. Equivalent to dropping it.
    pub fn release(self) {}

    /// Convert to an upright image for inference.
    ///
    /// Gray, NV21 and YUYV frames become 8-bit luma images; RGBA stays RGBA.
    pub fn to_image(&self) -> Result<DynamicImage, FrameError> {
        let (w, h) = (self.width, self.height);
        let pixels = (w as usize) * (h as usize);

        let image = match self.format {
            PixelFormat::Gray | PixelFormat::Nv21 => {
                // NV21 carries the Y plane first; the chroma plane is not needed.
                let expected = match self.format {
                    PixelFormat::Nv21 => pixels + pixels / 2,
                    _ => pixels,
                };
                let luma = self.checked_prefix(expected)?[..pixels].to_vec();
                DynamicImage::ImageLuma8(self.gray_from_raw(luma, expected)?)
            }
            PixelFormat::Yuyv => {
                let luma = yuyv_to_grayscale(&self.data, w, h)?;
                DynamicImage::ImageLuma8(self.gray_from_raw(luma, pixels * 2)?)
            }
            PixelFormat::Rgba => {
                let expected = pixels * 4;
                let rgba = self.checked_prefix(expected)?.to_vec();
                let img = RgbaImage::from_raw(w, h, rgba).ok_or(self.length_error(expected))?;
                DynamicImage::ImageRgba8(img)
            }
        };

        match self.rotation {
            0 => Ok(image),
            90 => Ok(image.rotate90()),
            180 => Ok(image.rotate180()),
            270 => Ok(image.rotate270()),
            other => Err(FrameError::InvalidRotation(other)),
        }
    }

    fn checked_prefix(&self, expected: usize) -> Result<&[u8], FrameError> {
        if self.data.len() < expected {
            return Err(self.length_error(expected));
        }
        Ok(&self.data[..expected])
    }

    fn gray_from_raw(&self, luma: Vec<u8>, expected: usize) -> Result<GrayImage, FrameError> {
        GrayImage::from_raw(self.width, self.height, luma).ok_or(self.length_error(expected))
    }

    fn length_error(&self, expected: usize) -> FrameError {
        FrameError::InvalidLength {
            format: self.format,
            expected,
            actual: self.data.len(),
        }
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
            tracing::trace!(seq = self.sequence, "frame released");
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("rotation", &self.rotation)
            .field("format", &self.format)
            .field("sequence", &self.sequence)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Input handed to the inference collaborator: a live frame or a picked image.
#[derive(Debug)]
pub enum InputImage {
    Frame(Frame),
    Still(DynamicImage),
}

impl InputImage {
    pub fn is_live(&self) -> bool {
        matches!(self, InputImage::Frame(_))
    }

    /// Upright image for inference. Stills are returned as is.
    pub fn to_image(&self) -> Result<std::borrow::Cow<'_, DynamicImage>, FrameError> {
        match self {
            InputImage::Frame(frame) => frame.to_image().map(std::borrow::Cow::Owned),
            InputImage::Still(image) => Ok(std::borrow::Cow::Borrowed(image)),
        }
    }
}

/// Convert packed YUYV (4:2:2) to grayscale by extracting the Y channel.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V].
/// Grayscale = every even-indexed byte.
pub fn yuyv_to_grayscale(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width as usize) * (height as usize) * 2;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            format: PixelFormat::Yuyv,
            expected,
            actual: yuyv.len(),
        });
    }
    Ok(yuyv[..expected].iter().step_by(2).copied().collect())
}
