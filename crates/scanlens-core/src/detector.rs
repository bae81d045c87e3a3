//! Inference collaborator interface.

use crate::types::{Detection, DetectionKind};
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("inference failed: {0}")]
    InferenceFailed(String),
}

/// A blocking, kind-specific detector.
///
/// One implementation per detection kind. Calls are stateless requests;
/// `&mut self` only lets implementations reuse scratch buffers between calls.
pub trait Detector: Send + 'static {
    fn kind(&self) -> DetectionKind;

    /// Run inference on an upright image.
    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<Detection>, DetectorError>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn kind(&self) -> DetectionKind {
        (**self).kind()
    }

    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<Detection>, DetectorError> {
        (**self).detect(image)
    }
}
